use flag_cuckoo::{DecodeError, Filter, Fnv1a64, Snapshot};

const REFERENCE_SNAPSHOT: &str = r#"{"filter":"AAAAAAAAAAChyQAAAAAAAKHJAAAAAAAAONKlyQAAAAAIhwAAAAAAAAAAAAAAAAAAAAAAAAAAAABAnQAAAAAAAAAAAAAAAAAAAAAAAAAAAADLPwAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAcdx5tgAAAACNEQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAPaPvckAAAAAAAAAAAAAAACSYQAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==","rollout":"ZPPzHfbwt2xk7lAWLwPCQgE+Qryr1ydL"}"#;

// Helper function to decode a snapshot from its JSON wire form
fn from_json(json: &str) -> Filter {
    let snapshot: Snapshot = serde_json::from_str(json).expect("valid snapshot json");
    snapshot.decode().expect("snapshot should decode")
}

#[test]
fn test_reference_snapshot() {
    let filter = from_json(REFERENCE_SNAPSHOT);

    assert_eq!(filter.num_buckets(), 32);
    assert_eq!(filter.capacity(), 128);
    assert_eq!(filter.len(), 13);
    assert_eq!(filter.rollout_len(), 3);

    assert!(filter.lookup(b"temper_api_e2e:user:1"));
    assert!(!filter.lookup(b"temper_api_e2e:user:2"));
    assert!(filter.lookup(b"temper_api_e2e_rollout:user:3"));
}

#[test]
fn test_reference_lookup_paths() {
    let filter = from_json(REFERENCE_SNAPSHOT);

    // Enabled through the bucket table, not the rollout
    assert!(filter.contains(b"temper_api_e2e:user:1"));
    assert!(!filter.enabled_by_rollout(b"temper_api_e2e:user:1"));

    // Enabled through the 100% rollout, not the bucket table
    assert!(!filter.contains(b"temper_api_e2e_rollout:user:3"));
    assert!(filter.enabled_by_rollout(b"temper_api_e2e_rollout:user:3"));
    assert_eq!(filter.rollout_percentage(b"temper_api_e2e_rollout"), Some(100));
    assert_eq!(filter.rollout_percentage(b"temper_api_e2e"), None);
}

#[test]
fn test_rollout_percentage() {
    let filter = from_json(r#"{"filter":null,"rollout":"MkVpBxSg9TI="}"#);

    assert_eq!(filter.num_buckets(), 0);
    assert_eq!(filter.rollout_percentage(b"test_team_feature"), Some(50));

    // full key hash mod 100 is 74
    assert!(!filter.lookup(b"test_team_feature:user:1"));
    // full key hash mod 100 is 41
    assert!(filter.lookup(b"test_team_feature:user:4"));
}

#[test]
fn test_rollout_only() {
    let filter = from_json(r#"{"filter":null,"rollout":"ZPPzHfbwt2xk7lAWLwPCQgE+Qryr1ydL"}"#);

    // No delimiter, the whole key is the feature key
    assert!(filter.lookup(b"temper_api_e2e_rollout"));
    assert!(filter.lookup(b"temper_api_e2e_rollout:user:3"));
    // Membership entries are gone without a bucket table
    assert!(!filter.lookup(b"temper_api_e2e:user:1"));
}

#[test]
fn test_no_delimiter_on_full_snapshot() {
    let filter = from_json(REFERENCE_SNAPSHOT);
    assert!(filter.lookup(b"temper_api_e2e_rollout"));
}

#[test]
fn test_zero_snapshot() {
    let filter = from_json("{}");

    assert!(filter.is_fail_safe());
    assert!(!filter.lookup(b"test:user:1"));
    // Malformed key (missing the `:`) shouldn't break and should return false
    assert!(!filter.lookup(b"test"));
    assert!(!filter.lookup(b""));
    assert!(!filter.lookup(b":"));
}

#[test]
fn test_fail_safe_ignores_zero_rollout_bucket() {
    // This key hashes to rollout bucket 0, which a 0% rollout would let in
    let key = b"unknown_feature:user:449";

    let fail_safe = Filter::<Fnv1a64>::default();
    assert!(!fail_safe.lookup(key));

    let rollout_only = from_json(r#"{"rollout":"MkVpBxSg9TI="}"#);
    assert!(rollout_only.enabled_by_rollout(key));
    assert!(rollout_only.lookup(key));
}

#[test]
fn test_empty_tables_are_absent() {
    let filter = Filter::<Fnv1a64>::decode(Some(&[]), Some(&[])).unwrap();
    assert!(filter.is_fail_safe());
    assert!(!filter.lookup(b"test:user:1"));
}

#[test]
fn test_decode_rejects_malformed_length() {
    let result = Filter::<Fnv1a64>::decode(Some(&[0u8; 10]), None);
    assert_eq!(result.unwrap_err(), DecodeError::MalformedLength(10));
}

#[test]
fn test_decode_rejects_too_small() {
    let result = Filter::<Fnv1a64>::decode(Some(&[0u8; 4]), None);
    assert_eq!(result.unwrap_err(), DecodeError::TooSmall(4));
}

#[test]
fn test_decode_rejects_non_power_of_two() {
    let error = Filter::<Fnv1a64>::decode(Some(&[0u8; 24]), None).unwrap_err();
    assert_eq!(error, DecodeError::NotPowerOfTwo(3));
    assert!(error.to_string().contains("power of 2"));
}

#[test]
fn test_decode_rejects_malformed_rollout_length() {
    let result = Filter::<Fnv1a64>::decode(None, Some(&[0u8; 12]));
    assert_eq!(result.unwrap_err(), DecodeError::MalformedRolloutLength(12));

    // A valid bucket table does not rescue a bad rollout stream
    let result = Filter::<Fnv1a64>::decode(Some(&[0u8; 16]), Some(&[0u8; 7]));
    assert_eq!(result.unwrap_err(), DecodeError::MalformedRolloutLength(7));
}

#[test]
fn test_decode_checks_divisibility_before_size() {
    // 2 bytes fail the divisibility check before the size check
    let result = Filter::<Fnv1a64>::decode(Some(&[0u8; 2]), None);
    assert_eq!(result.unwrap_err(), DecodeError::MalformedLength(2));
}

#[test]
fn test_decode_ignores_partial_trailing_bucket() {
    // 12 bytes pass the multiple-of-4 check and hold one whole bucket
    let mut bytes = vec![0u8; 12];
    bytes[0] = 1;
    bytes[8] = 0xff;
    let filter = Filter::<Fnv1a64>::decode(Some(&bytes), None).unwrap();
    assert_eq!(filter.num_buckets(), 1);
    assert_eq!(filter.len(), 1);
}

#[test]
fn test_decode_counts_occupied_slots() {
    let mut bytes = vec![0u8; 4 * 8];
    for (i, fingerprint) in [(0usize, 7u16), (3, 65534), (9, 1)] {
        bytes[i * 2..i * 2 + 2].copy_from_slice(&fingerprint.to_le_bytes());
    }
    let filter = Filter::<Fnv1a64>::decode(Some(&bytes), None).unwrap();
    assert_eq!(filter.num_buckets(), 4);
    assert_eq!(filter.len(), 3);
    assert!(!filter.is_empty());
    assert!(!filter.is_fail_safe());
}

#[test]
fn test_zeroed_table_is_not_fail_safe() {
    let filter = Filter::<Fnv1a64>::decode(Some(&[0u8; 64]), None).unwrap();
    assert!(filter.is_empty());
    assert!(!filter.is_fail_safe());
    assert!(!filter.contains(b"temper_api_e2e:user:1"));
}

#[test]
fn test_to_snapshot_reproduces_filter() {
    let original: Snapshot = serde_json::from_str(REFERENCE_SNAPSHOT).unwrap();
    let filter: Filter = original.decode().unwrap();
    let snapshot = filter.to_snapshot();

    assert_eq!(snapshot.filter, original.filter);
    let rollout = snapshot.rollout.as_deref().unwrap();
    assert_eq!(rollout.len(), 24);

    let decoded: Filter = snapshot.decode().unwrap();
    assert_eq!(decoded.len(), filter.len());
    for key in [
        "temper_api_e2e:user:1",
        "temper_api_e2e:user:2",
        "temper_api_e2e_rollout:user:3",
        "temper_api_e2e_rollout",
    ] {
        assert_eq!(decoded.lookup(key.as_bytes()), filter.lookup(key.as_bytes()));
    }

    assert_eq!(Filter::<Fnv1a64>::default().to_snapshot(), Snapshot::default());
}
