//! CSV report of a run's per-image records

use crate::error::PipelineError;
use aiia_common::models::ImageRecord;
use std::io::Write;
use std::path::Path;

pub const CSV_COLUMNS: [&str; 12] = [
    "image_name",
    "image_path",
    "category",
    "subcategory",
    "tags",
    "score",
    "star_rating",
    "critique",
    "quality_score",
    "metadata_written",
    "timestamp",
    "placeholder",
];

/// Write one row per record to `path`
pub fn write_csv_report(path: &Path, records: &[ImageRecord]) -> Result<(), PipelineError> {
    let file = std::fs::File::create(path)?;
    write_records(file, records)?;
    tracing::info!(path = %path.display(), rows = records.len(), "CSV report written");
    Ok(())
}

/// Write the report to any writer
pub fn write_records<W: Write>(writer: W, records: &[ImageRecord]) -> Result<(), PipelineError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(CSV_COLUMNS)?;

    for record in records {
        let c = &record.classification;
        let star_rating = record.star_rating.unwrap_or_else(|| c.star_rating());
        let tags = if record.written_tags.is_empty() {
            c.tags.join(", ")
        } else {
            record.written_tags.join(", ")
        };

        csv.write_record([
            record.image_name.clone(),
            record.file_path.display().to_string(),
            c.category.to_string(),
            c.subcategory.clone(),
            tags,
            format!("{}/{}", c.score, c.scale.max()),
            star_rating.to_string(),
            c.critique.clone().unwrap_or_default(),
            record
                .quality_score
                .map(|q| format!("{:.4}", q))
                .unwrap_or_default(),
            record.metadata_written.to_string(),
            record.timestamp.to_rfc3339(),
            c.is_placeholder().to_string(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}
