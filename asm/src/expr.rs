#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Number(i64),                           // literal        | 42, 0x2A, 'A'
    Ident(String),                         // symbol         | label, .local, CONST
    Current,                               // here           | $
    Unary(UnaryOp, Box<Expr>),             // unary op       | -expr, ~expr
    Binary(Box<Expr>, BinOp, Box<Expr>),   // bin op         | expr1 + expr2
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg, // -  arithmetic negation
    Not, // ~  bitwise not
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add, // +  arithmetic addition
    Sub, // -  arithmetic subtraction
    Mul, // *  arithmetic multiplication
    Div, // /  arithmetic division
    Mod, // %  arithmetic modulus
    And, // &  bitwise and
    Or,  // |  bitwise or
    Xor, // ^  bitwise xor
    Shl, // << shift left
    Shr, // >> shift right
}

/// Where identifiers and `$` get their values during evaluation.
pub trait Env {
    fn lookup(&self, name: &str) -> Option<i64>;
    fn current(&self) -> Option<i64>;
}

/// Relocation weight of an identifier: 1 for an address, 0 for a constant.
pub trait Weigh {
    fn weight(&self, name: &str) -> Option<i32>;
}

impl Expr {
    pub fn ident(name: &str) -> Self {
        Expr::Ident(name.to_string())
    }

    pub fn binary(lhs: Expr, op: BinOp, rhs: Expr) -> Self {
        Expr::Binary(Box::new(lhs), op, Box::new(rhs))
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            Expr::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Every identifier referenced, in source order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Expr::Ident(name) => names.push(name),
            Expr::Unary(_, expr) => expr.collect_identifiers(names),
            Expr::Binary(lhs, _, rhs) => {
                lhs.collect_identifiers(names);
                rhs.collect_identifiers(names);
            }
            Expr::Number(_) | Expr::Current => {}
        }
    }

    pub fn uses_current(&self) -> bool {
        match self {
            Expr::Current => true,
            Expr::Unary(_, expr) => expr.uses_current(),
            Expr::Binary(lhs, _, rhs) => lhs.uses_current() || rhs.uses_current(),
            _ => false,
        }
    }

    /// Value of the expression, or `None` if anything it needs is unknown.
    pub fn eval(&self, env: &dyn Env) -> Option<i64> {
        match self {
            Expr::Number(n) => Some(*n),
            Expr::Ident(name) => env.lookup(name),
            Expr::Current => env.current(),
            Expr::Unary(op, expr) => {
                let v = expr.eval(env)?;
                Some(match op {
                    UnaryOp::Neg => v.wrapping_neg(),
                    UnaryOp::Not => !v,
                })
            }
            Expr::Binary(lhs, op, rhs) => {
                let l = lhs.eval(env)?;
                let r = rhs.eval(env)?;
                apply(*op, l, r)
            }
        }
    }

    /// Net count of addresses in the expression.
    ///
    /// An expression with weight 1 moves with its module; weight 0 is absolute.
    /// Anything else (or an address under `*`, `&`, ...) is `None`.
    pub fn relocation_weight(&self, weigh: &dyn Weigh) -> Option<i32> {
        match self {
            Expr::Number(_) => Some(0),
            Expr::Current => Some(1),
            Expr::Ident(name) => weigh.weight(name),
            Expr::Unary(UnaryOp::Neg, expr) => expr.relocation_weight(weigh).map(|w| -w),
            Expr::Unary(UnaryOp::Not, expr) => match expr.relocation_weight(weigh)? {
                0 => Some(0),
                _ => None,
            },
            Expr::Binary(lhs, op, rhs) => {
                let l = lhs.relocation_weight(weigh)?;
                let r = rhs.relocation_weight(weigh)?;
                match op {
                    BinOp::Add => Some(l + r),
                    BinOp::Sub => Some(l - r),
                    _ if l == 0 && r == 0 => Some(0),
                    _ => None,
                }
            }
        }
    }

    /// Replace every absolute subexpression with its value.
    pub fn fold(&self, env: &dyn Env, weigh: &dyn Weigh) -> Expr {
        if let Expr::Number(_) = self {
            return self.clone();
        }
        if self.relocation_weight(weigh) == Some(0) {
            if let Some(v) = self.eval(env) {
                return Expr::Number(v);
            }
        }
        match self {
            Expr::Unary(op, expr) => Expr::Unary(*op, Box::new(expr.fold(env, weigh))),
            Expr::Binary(lhs, op, rhs) => Expr::Binary(
                Box::new(lhs.fold(env, weigh)),
                *op,
                Box::new(rhs.fold(env, weigh)),
            ),
            _ => self.clone(),
        }
    }
}

fn apply(op: BinOp, l: i64, r: i64) -> Option<i64> {
    Some(match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::Mul => l.wrapping_mul(r),
        BinOp::Div => l.checked_div(r)?,
        BinOp::Mod => l.checked_rem(r)?,
        BinOp::And => l & r,
        BinOp::Or => l | r,
        BinOp::Xor => l ^ r,
        BinOp::Shl => l.checked_shl(u32::try_from(r).ok()?)?,
        BinOp::Shr => l.checked_shr(u32::try_from(r).ok()?)?,
    })
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{}", n),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Current => write!(f, "$"),
            Expr::Unary(UnaryOp::Neg, expr) => write!(f, "-{}", expr),
            Expr::Unary(UnaryOp::Not, expr) => write!(f, "~{}", expr),
            Expr::Binary(lhs, op, rhs) => {
                let op = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                    BinOp::Mod => "%",
                    BinOp::And => "&",
                    BinOp::Or => "|",
                    BinOp::Xor => "^",
                    BinOp::Shl => "<<",
                    BinOp::Shr => ">>",
                };
                write!(f, "({} {} {})", lhs, op, rhs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Map(HashMap<&'static str, (i64, i32)>, Option<i64>);

    impl Env for Map {
        fn lookup(&self, name: &str) -> Option<i64> {
            self.0.get(name).map(|(v, _)| *v)
        }
        fn current(&self) -> Option<i64> {
            self.1
        }
    }

    impl Weigh for Map {
        fn weight(&self, name: &str) -> Option<i32> {
            self.0.get(name).map(|(_, w)| *w)
        }
    }

    fn env() -> Map {
        let mut map = HashMap::new();
        map.insert("start", (0x100, 1));
        map.insert("end", (0x120, 1));
        map.insert("SIZE", (8, 0));
        Map(map, Some(0x104))
    }

    #[test]
    fn evaluate() {
        let env = env();
        let e = Expr::binary(Expr::ident("end"), BinOp::Sub, Expr::ident("start"));
        assert_eq!(e.eval(&env), Some(0x20));
        let e = Expr::binary(Expr::Number(1), BinOp::Shl, Expr::ident("SIZE"));
        assert_eq!(e.eval(&env), Some(256));
        assert_eq!(Expr::Current.eval(&env), Some(0x104));
        assert_eq!(Expr::ident("missing").eval(&env), None);
    }

    #[test]
    fn division_by_zero_has_no_value() {
        let e = Expr::binary(Expr::Number(1), BinOp::Div, Expr::Number(0));
        assert_eq!(e.eval(&env()), None);
    }

    #[test]
    fn weight() {
        let env = env();
        let diff = Expr::binary(Expr::ident("end"), BinOp::Sub, Expr::ident("start"));
        assert_eq!(diff.relocation_weight(&env), Some(0));
        let offset = Expr::binary(Expr::ident("start"), BinOp::Add, Expr::ident("SIZE"));
        assert_eq!(offset.relocation_weight(&env), Some(1));
        let sum = Expr::binary(Expr::ident("start"), BinOp::Add, Expr::ident("end"));
        assert_eq!(sum.relocation_weight(&env), Some(2));
        let scaled = Expr::binary(Expr::ident("start"), BinOp::Mul, Expr::Number(2));
        assert_eq!(scaled.relocation_weight(&env), None);
    }

    #[test]
    fn fold_keeps_addresses() {
        let env = env();
        let e = Expr::binary(
            Expr::ident("start"),
            BinOp::Add,
            Expr::binary(Expr::ident("SIZE"), BinOp::Mul, Expr::Number(2)),
        );
        let folded = e.fold(&env, &env);
        assert_eq!(
            folded,
            Expr::binary(Expr::ident("start"), BinOp::Add, Expr::Number(16))
        );
        assert_eq!(folded.eval(&env), e.eval(&env));
    }
}
