//! Wire-protocol tests: endpoint paths and 400-body rejection parsing.

use proptest::prelude::*;

use hksync_engine::transport::protocol::{data_set_path, parse_rejected_indices};

#[test]
fn data_set_path_embeds_upload_id() {
    assert_eq!(
        data_set_path("upload-123"),
        "/v1/data_sets/upload-123/data"
    );
}

#[test]
fn rejection_pointers_parse_to_indices() {
    let body = r#"{
        "errors": [
            { "source": { "pointer": "/3" } },
            { "source": { "pointer": "/0" } },
            { "source": { "pointer": "/17" } }
        ]
    }"#;
    assert_eq!(parse_rejected_indices(body), vec![0, 3, 17]);
}

#[test]
fn duplicate_pointers_are_deduplicated() {
    let body = r#"{"errors": [
        { "source": { "pointer": "/2" } },
        { "source": { "pointer": "/2" } }
    ]}"#;
    assert_eq!(parse_rejected_indices(body), vec![2]);
}

#[test]
fn deep_pointers_resolve_to_their_leading_index() {
    let body = r#"{"errors": [
        { "source": { "pointer": "/3/time" } },
        { "source": { "pointer": "/12/payload/value" } }
    ]}"#;
    assert_eq!(parse_rejected_indices(body), vec![3, 12]);
}

#[test]
fn entries_without_pointers_are_skipped() {
    let body = r#"{"errors": [
        { "source": { "pointer": "/1" } },
        { "source": {} },
        {},
        { "source": { "pointer": "not-an-index" } }
    ]}"#;
    assert_eq!(parse_rejected_indices(body), vec![1]);
}

#[test]
fn unparseable_body_yields_no_indices() {
    assert!(parse_rejected_indices("<html>bad gateway</html>").is_empty());
    assert!(parse_rejected_indices("").is_empty());
    assert!(parse_rejected_indices(r#"{"message": "no errors array"}"#).is_empty());
}

proptest! {
    #[test]
    fn parsing_never_panics_on_arbitrary_bodies(body in ".{0,200}") {
        let _ = parse_rejected_indices(&body);
    }

    #[test]
    fn valid_pointer_lists_roundtrip(mut indices in proptest::collection::vec(0usize..400, 0..20)) {
        let errors: Vec<String> = indices
            .iter()
            .map(|index| format!(r#"{{ "source": {{ "pointer": "/{index}" }} }}"#))
            .collect();
        let body = format!(r#"{{ "errors": [{}] }}"#, errors.join(","));

        indices.sort_unstable();
        indices.dedup();
        prop_assert_eq!(parse_rejected_indices(&body), indices);
    }
}
