use std::collections::HashMap;

use waylink_core::attr::{bytes_attr, default_parsing_callback, int_attr, variable_bytes_attr};
use waylink_core::{AttrValue, Layer, PreEncodeFrame, Scheme, Serializer};

/// Scenario A from the packet-scheme data model: one header-only layer, both
/// attributes fixed size.
#[test]
fn scenario_a_fixed_size_single_layer() {
    let layer = Layer::new(
        vec![bytes_attr("payload", 4).unwrap(), int_attr("len", 1).unwrap()],
        vec![],
    )
    .unwrap();
    let scheme = Scheme::with_layers(vec![layer], HashMap::new()).unwrap();
    let serializer = Serializer::new(scheme);

    let mut frame = PreEncodeFrame::new(1);
    frame.push(0, AttrValue::Bytes(b"abcd".to_vec()));
    frame.push(0, AttrValue::Int(5));

    let wire = serializer.encode(&frame).unwrap();
    assert_eq!(wire, b"abcd\x05");

    let (decoded, meta) = serializer.decode(&wire).unwrap();
    assert!(meta.redundant_bytes.is_empty());
    assert_eq!(decoded.get("payload").unwrap().as_bytes(), Some(&b"abcd"[..]));
    assert_eq!(decoded.get("len").unwrap().as_int(), Some(5));
}

/// Scenario B: a variable-length `body` whose size is resolved from `len`,
/// declared in the same layer.
#[test]
fn scenario_b_variable_length_via_same_layer_dependency() {
    let layer = Layer::new(
        vec![
            int_attr("len", 1).unwrap(),
            variable_bytes_attr("body", default_parsing_callback()).unwrap(),
        ],
        vec![],
    )
    .unwrap();

    let mut dependencies = HashMap::new();
    let mut entry = waylink_core::scheme::DependencyEntry::new();
    entry.insert(0, vec!["len".to_string()]);
    dependencies.insert("body".to_string(), entry);

    let scheme = Scheme::with_layers(vec![layer], dependencies).unwrap();
    let serializer = Serializer::new(scheme);

    let mut frame = PreEncodeFrame::new(1);
    frame.push(0, AttrValue::Int(3));
    frame.push(0, AttrValue::Bytes(b"xyz".to_vec()));

    let wire = serializer.encode(&frame).unwrap();
    assert_eq!(wire, b"\x03xyz");

    let (decoded, _) = serializer.decode(&wire).unwrap();
    assert_eq!(decoded.get("len").unwrap().as_int(), Some(3));
    assert_eq!(decoded.get("body").unwrap().as_bytes(), Some(&b"xyz"[..]));
}

#[test]
fn rejects_duplicate_attribute_names_across_layers() {
    let a = Layer::new(vec![bytes_attr("id", 1).unwrap()], vec![]).unwrap();
    let b = Layer::new(vec![bytes_attr("id", 2).unwrap()], vec![]).unwrap();
    let err = Scheme::with_layers(vec![a, b], HashMap::new()).unwrap_err();
    assert_eq!(
        err,
        waylink_core::SchemeError::DuplicateAttrName { name: "id".to_string() }
    );
}
