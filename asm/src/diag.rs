use crate::{
    marker::{Marker, Severity},
    unit::{CompilationUnit, Units},
};
use color_print::{cformat, cprintln};

/// Header line of a marker, colored by severity.
pub fn headline(marker: &Marker) -> String {
    let message = match &marker.cause {
        Some(cause) => format!("{} ({})", marker.message, cause),
        None => marker.message.clone(),
    };
    match marker.severity {
        Severity::Error => cformat!("<red,bold>error</>: {}", message),
        Severity::Warning => cformat!("<yellow,bold>warn</>: {}", message),
        Severity::Info => cformat!("<green,bold>note</>: {}", message),
    }
}

/// Print one marker with the offending source line.
pub fn print(unit: &CompilationUnit, source: Option<&str>, marker: &Marker) {
    println!("{}", headline(marker));
    let Some(location) = marker.location else {
        cprintln!("     <blue>--></> <underline>{}</>", unit.identifier());
        return;
    };
    cprintln!("     <blue>--></> <underline>{}:{}</>", unit.identifier(), location);

    let Some(raw) = source.and_then(|s| s.lines().nth(location.line)) else {
        return;
    };
    let mark = format!("{}{}", " ".repeat(location.column), "^".repeat(location.len.max(1)));
    cprintln!("      <blue>|</>");
    cprintln!(" <blue>{:>4} |</> {}", location.line + 1, raw);
    cprintln!("      <blue>|</> <red>{}</>", mark);
}

/// Print every marker of every unit, in compilation order. Returns the
/// number of errors.
pub fn report(units: &Units) -> usize {
    let mut errors = 0;
    for unit in units.iter() {
        let markers = unit.markers(None);
        if markers.is_empty() {
            continue;
        }
        let source = unit.resource().read_to_string().ok();
        for marker in markers {
            print(unit, source.as_deref(), marker);
            if marker.is_error() {
                errors += 1;
            }
        }
    }
    errors
}
