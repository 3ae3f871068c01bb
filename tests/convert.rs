use gossamer::{Error, LiteralError, convert, parse_type};

fn run(from: &str, to: &str, text: &str) -> Result<String, Error> {
    convert(parse_type(from)?, parse_type(to)?, text)
}

#[test]
fn test_integer_conversions_wrap() {
    assert_eq!(run("int", "uint8", "-1").unwrap(), "255");
    assert_eq!(run("uint32", "int16", "0x18000").unwrap(), "-32768");
    assert_eq!(run("int8", "int64", "-5").unwrap(), "-5");
    assert_eq!(run("int8", "uint64", "-1").unwrap(), "18446744073709551615");
    assert_eq!(run("uint64", "int64", "18446744073709551615").unwrap(), "-1");
}

#[test]
fn test_float_conversions() {
    assert_eq!(run("float64", "int", "-3.99").unwrap(), "-3");
    assert_eq!(run("int64", "float64", "9007199254740993").unwrap(), "9007199254740992");
    assert_eq!(run("float64", "float64", "1e-7").unwrap(), "1e-07");
    assert_eq!(run("complex128", "complex64", "(0.1+2e30i)").unwrap(), "(0.1+2e+30i)");
}

#[test]
fn test_string_conversions() {
    assert!(matches!(
        run("[]byte", "string", "x"),
        Err(Error::Literal(LiteralError::Unsupported(_)))
    ));
    assert_eq!(run("int", "string", "65").unwrap(), "A");
    assert_eq!(run("int", "string", "-1").unwrap(), "\u{fffd}");
    assert_eq!(run("string", "[]int32", "añb").unwrap(), "[97 241 98]");
}

#[test]
fn test_interface_destinations_box_the_value() {
    assert_eq!(run("int", "any", "7").unwrap(), "7");
    assert_eq!(run("bool", "interface {}", "true").unwrap(), "true");
    let err = run("string", "error", "x").unwrap_err();
    assert!(matches!(err, Error::MissingMethod { .. }));
    assert_eq!(
        err.to_string(),
        "cannot convert string to error: missing method Error"
    );
    assert_eq!(
        run("float64", "complex128", "2").unwrap_err().to_string(),
        "panic: unsupported conversion from float64 to complex128"
    );
}
