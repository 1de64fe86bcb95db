use super::*;

#[test]
fn empty_filter_has_no_predicate() {
    let filter = QueryFilter::default();
    assert!(filter.is_empty());
    assert_eq!(filter.to_predicate(), None);
}

#[test]
fn filter_clauses_are_joined() {
    let filter = QueryFilter {
        equipment_type: Some("Heavy Utility Truck".to_string()),
        severity: Some(Severity::Critical),
        chunk_type: Some(ChunkType::Resolution),
    };

    assert_eq!(
        filter.to_predicate().as_deref(),
        Some(
            "equipment_type = 'Heavy Utility Truck' AND severity = 'critical' \
             AND chunk_type = 'resolution'"
        )
    );
}

#[test]
fn single_quotes_are_escaped() {
    let filter = QueryFilter {
        equipment_type: Some("Driver's Cab".to_string()),
        ..QueryFilter::default()
    };

    assert_eq!(
        filter.to_predicate().as_deref(),
        Some("equipment_type = 'Driver''s Cab'")
    );
}

#[test]
fn not_found_message_points_at_ingestion() {
    let err = IndexError::NotFound {
        collection: "maintenance_logs".to_string(),
    };
    let message = err.to_string();
    assert!(message.contains("maintenance_logs"));
    assert!(message.contains("ingestion"));
}
