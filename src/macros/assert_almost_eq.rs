/// Asserts that two `f64` expressions differ by less than an absolute precision.
///
/// An optional trailing format string and arguments are appended to the panic message, which
/// helps when the assertion sits inside a loop over trajectory samples.
#[macro_export]
macro_rules! assert_almost_eq {
    ($a:expr, $b:expr, $prec:expr $(,)?) => {
        if !$crate::numeric::almost_eq($a, $b, $prec) {
            panic!(
                "assertion failed: `abs(left - right) < {:e}`, (left: `{}`, right: `{}`)",
                $prec, $a, $b
            );
        }
    };
    ($a:expr, $b:expr, $prec:expr, $($arg:tt)+) => {
        if !$crate::numeric::almost_eq($a, $b, $prec) {
            panic!(
                "assertion failed: `abs(left - right) < {:e}`, (left: `{}`, right: `{}`): {}",
                $prec,
                $a,
                $b,
                format_args!($($arg)+)
            );
        }
    };
}
