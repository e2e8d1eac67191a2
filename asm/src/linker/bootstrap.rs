use crate::{
    compiler::{Compiler, NullListener},
    error::Error,
    program::Program,
    resource::Resource,
};
use once_cell::sync::Lazy;

/// Relocator placed ahead of a self-relocating image. The relocation
/// table follows it directly, then the program, laid out from address 0.
/// Every table entry is the offset of a word in the program; the stub adds
/// the program's load address to each of them and jumps to the program.
pub const SOURCE: &str = "\
; self-relocation stub
        .equ  STUB_SIZE  stub_end - stub
stub:   mov   s0, pc            ; pc is past this word
        sub   s0, 1             ; s0 = stub load address
        mov   s1, s0
        add   s1, STUB_SIZE     ; s1 = relocation table
        ld    s2, s1            ; s2 = entry count
        add   s1, 1
        mov   s3, s1
        add   s3, s2            ; s3 = program base
        mov   t2, s0
        add   t2, next - stub
        mov   t3, s0
        add   t3, done - stub
next:   jz    s2, t3
        ld    t0, s1
        add   t0, s3            ; t0 = word to patch
        ld    t1, t0
        add   t1, s3
        st    t1, t0
        add   s1, 1
        sub   s2, 1
        jmp   t2
done:   jmp   s3
stub_end:
";

static BOOTSTRAP: Lazy<Vec<u8>> = Lazy::new(|| match assemble(SOURCE) {
    Ok(bytes) => bytes,
    Err(e) => panic!("self-relocation stub does not assemble: {}", e),
});

/// Machine code of the relocation stub, assembled on first use.
///
/// # Panics
///
/// If the embedded stub fails to assemble.
pub fn bootstrap() -> &'static [u8] {
    &BOOTSTRAP
}

fn assemble(source: &str) -> Result<Vec<u8>, Error> {
    let mut program = Program::new();
    let unit = program.add(Resource::text("bootstrap.rk", source));
    if !Compiler::new().compile(&mut program, &mut NullListener) {
        let messages: Vec<String> = program
            .units
            .unit(unit)?
            .markers(None)
            .iter()
            .map(|m| m.to_string())
            .collect();
        return Err(Error::UnitHasErrors(messages.join("; ")));
    }
    let unit = program.units.unit(unit)?;
    let code = unit
        .object_code()
        .ok_or_else(|| Error::NoObjectCode(unit.identifier().to_string()))?;
    code.bytes()
}
