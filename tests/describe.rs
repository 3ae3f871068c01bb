use gossamer::{describe, parse_type, satisfaction_report};
use insta::assert_snapshot;

fn describe_expr(src: &str) -> String {
    describe(parse_type(src).unwrap()).to_string()
}

#[test]
fn test_describe_struct_with_embedded_error() {
    assert_snapshot!(describe_expr("struct{ N int; error }"), @r"
    type:       struct { N int; error }
    kind:       struct
    size:       12
    comparable: true
    zero:       {0 <nil>}
    methods:
      Error() string [promoted via field 1]
    ");
}

#[test]
fn test_describe_array_of_maps() {
    assert_snapshot!(describe_expr("[2]map[string]bool"), @r"
    type:       [2]map[string]bool
    kind:       array
    size:       8
    comparable: false
    zero:       [map[] map[]]
    methods:    none
    ");
}

#[test]
fn test_describe_directional_channel() {
    assert_snapshot!(describe_expr("chan<- func(int) error"), @r"
    type:       chan<- func(int) error
    kind:       chan
    size:       4
    comparable: true
    zero:       <nil>
    methods:    none
    ");
}

#[test]
fn test_describe_interface_lists_sorted_methods() {
    assert_snapshot!(describe_expr("interface{ Write([]byte) (int, error); Close() error }"), @r"
    type:       interface { Close() error; Write([]uint8) (int, error) }
    kind:       interface
    size:       8
    comparable: true
    zero:       <nil>
    methods:
      Close() error
      Write([]uint8) (int, error)
    ");
}

#[test]
fn test_satisfaction_against_interfaces() {
    let closer = parse_type("interface{ Close() error }").unwrap();
    let read_closer = parse_type("interface{ Close() error; Read([]byte) (int, error) }").unwrap();
    assert_eq!(
        satisfaction_report(read_closer, closer).unwrap(),
        "interface { Close() error; Read([]uint8) (int, error) } implements interface { Close() error }"
    );
    assert_eq!(
        satisfaction_report(closer, read_closer).unwrap(),
        "interface { Close() error } does not implement \
         interface { Close() error; Read([]uint8) (int, error) } (missing method Read)"
    );
}

#[test]
fn test_json_description() {
    let json = describe(parse_type("*struct{ X int }").unwrap()).to_json();
    assert_eq!(json["type"], "*struct { X int }");
    assert_eq!(json["kind"], "ptr");
    assert_eq!(json["zero"], "<nil>");
    assert_eq!(json["methods"].as_array().map(Vec::len), Some(0));
}
