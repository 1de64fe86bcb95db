use super::*;
use crate::test_support::{hydraulic_record, overheating_record};
use std::collections::HashSet;

#[test]
fn four_chunks_with_distinct_types() {
    let chunks = chunk_record(&overheating_record("ML-1")).expect("should chunk record");

    let types: HashSet<ChunkType> = chunks.iter().map(|c| c.metadata.chunk_type).collect();
    assert_eq!(types.len(), 4);

    let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "ML-1_fault_overview",
            "ML-1_diagnostic",
            "ML-1_resolution",
            "ML-1_engineer_notes"
        ]
    );
}

#[test]
fn chunking_is_deterministic() {
    let record = overheating_record("ML-1");
    let first = chunk_record(&record).expect("should chunk record");
    let second = chunk_record(&record).expect("should chunk record");
    assert_eq!(first, second);
}

#[test]
fn fault_overview_template() {
    let chunks = chunk_record(&overheating_record("ML-1")).expect("should chunk record");
    assert_eq!(
        chunks[0].text,
        "Equipment: Heavy Utility Truck (TRK-412). Date: 2024-01-14. Severity: high. \
         Fault: Engine overheating during sustained load. \
         Symptoms: Coolant temperature warning light active; Loss of power under load."
    );
}

#[test]
fn diagnostic_template() {
    let chunks = chunk_record(&overheating_record("ML-1")).expect("should chunk record");
    assert_eq!(
        chunks[1].text,
        "Fault: Engine overheating during sustained load on Heavy Utility Truck. \
         Diagnostic steps performed: Check coolant level and condition; Inspect thermostat operation."
    );
}

#[test]
fn resolution_template() {
    let chunks = chunk_record(&overheating_record("ML-1")).expect("should chunk record");
    assert_eq!(
        chunks[2].text,
        "Fault: Engine overheating during sustained load on Heavy Utility Truck. \
         Root cause: Thermostat stuck in closed position. \
         Resolution: Replaced thermostat and flushed cooling system. \
         Parts replaced: Thermostat, Coolant. Repair time: 6.5 hours."
    );
}

#[test]
fn engineer_notes_template() {
    let chunks = chunk_record(&overheating_record("ML-1")).expect("should chunk record");
    assert_eq!(
        chunks[3].text,
        "Engineer notes for Engine overheating during sustained load on Heavy Utility Truck \
         (TRK-412): Recommend follow-up inspection in 30 days."
    );
}

#[test]
fn empty_parts_render_as_none() {
    let mut record = overheating_record("ML-1");
    record.parts_replaced.clear();

    let chunks = chunk_record(&record).expect("should chunk record");
    assert!(chunks[2].text.contains("Parts replaced: none."));
}

#[test]
fn every_chunk_names_equipment_and_fault() {
    let record = hydraulic_record("ML-2");
    for chunk in chunk_record(&record).expect("should chunk record") {
        assert!(chunk.text.contains(&record.equipment_type), "{}", chunk.id);
        assert!(chunk.text.contains(&record.fault_description), "{}", chunk.id);
    }
}

#[test]
fn metadata_copies_record_fields() {
    let record = hydraulic_record("ML-2");
    let chunks = chunk_record(&record).expect("should chunk record");

    for chunk in &chunks {
        assert_eq!(chunk.metadata.record_id, "ML-2");
        assert_eq!(chunk.metadata.date, record.date);
        assert_eq!(chunk.metadata.equipment_id, "AV-233");
        assert_eq!(chunk.metadata.severity, Severity::Medium);
        assert!((chunk.metadata.repair_time_hours - 3.0).abs() < f64::EPSILON);
    }
}

#[test]
fn invalid_record_is_rejected_before_chunking() {
    let mut record = overheating_record("ML-1");
    record.fault_description = String::new();

    assert!(matches!(
        chunk_record(&record),
        Err(ValidationError::EmptyField {
            field: "fault_description",
            ..
        })
    ));
}

#[test]
fn empty_record_id_is_rejected_before_chunking() {
    assert!(matches!(
        chunk_record(&overheating_record("  ")),
        Err(ValidationError::EmptyField {
            field: "record_id",
            ..
        })
    ));
}

#[test]
fn whole_hour_repair_time_keeps_decimal() {
    let chunks = chunk_record(&hydraulic_record("ML-2")).expect("should chunk record");
    assert!(
        chunks[2].text.ends_with("Repair time: 3.0 hours."),
        "unexpected resolution text: {}",
        chunks[2].text
    );
}

#[test]
fn chunk_records_preserves_order() {
    let records = vec![overheating_record("ML-1"), hydraulic_record("ML-2")];
    let chunks = chunk_records(&records).expect("should chunk records");

    assert_eq!(chunks.len(), 8);
    assert_eq!(chunks[0].id, "ML-1_fault_overview");
    assert_eq!(chunks[4].id, "ML-2_fault_overview");
    assert_eq!(chunks[7].id, "ML-2_engineer_notes");
}

#[test]
fn chunk_type_round_trips_through_str() {
    for chunk_type in ChunkType::ALL {
        assert_eq!(chunk_type.as_str().parse::<ChunkType>().ok(), Some(chunk_type));
    }
    assert!("summary".parse::<ChunkType>().is_err());
}
