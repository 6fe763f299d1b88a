//! Archive-mode aggregate statistics

use aiia_common::models::{ArchiveStatistics, ImageRecord, GALLERY_TAG};
use std::collections::{BTreeMap, HashMap};

/// Number of entries in `top_tags`
pub const TOP_TAG_COUNT: usize = 10;

/// Final rating of a record: the persisted one, else the derived one
fn effective_rating(record: &ImageRecord) -> u8 {
    record
        .star_rating
        .unwrap_or_else(|| record.classification.star_rating())
}

/// Aggregate statistics over an archive run's records
///
/// Ratings are star ratings (1-5) regardless of the run's score scale.
/// `GALLERY` is excluded from the tag frequencies since it mirrors the
/// five-star count.
pub fn archive_statistics(records: &[ImageRecord]) -> ArchiveStatistics {
    if records.is_empty() {
        return ArchiveStatistics::default();
    }

    let mut rating_distribution: BTreeMap<u8, usize> = (1..=5).map(|r| (r, 0)).collect();
    let mut category_distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut tag_counts: HashMap<&str, usize> = HashMap::new();
    let mut rating_sum = 0u64;

    for record in records {
        let rating = effective_rating(record);
        rating_sum += rating as u64;
        *rating_distribution.entry(rating).or_insert(0) += 1;

        *category_distribution
            .entry(record.classification.category.to_string())
            .or_insert(0) += 1;

        for tag in &record.classification.tags {
            let tag = tag.trim();
            if !tag.is_empty() && tag != GALLERY_TAG {
                *tag_counts.entry(tag).or_insert(0) += 1;
            }
        }
    }

    let mut top_tags: Vec<(String, usize)> = tag_counts
        .into_iter()
        .map(|(tag, count)| (tag.to_string(), count))
        .collect();
    // Most frequent first, ties alphabetical
    top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_tags.truncate(TOP_TAG_COUNT);

    let total = records.len();
    let five_star_images = rating_distribution.get(&5).copied().unwrap_or(0);

    ArchiveStatistics {
        total_images: total,
        average_rating: rating_sum as f64 / total as f64,
        rating_distribution,
        category_distribution,
        top_tags,
        five_star_images,
        gallery_worthy_percentage: five_star_images as f64 / total as f64 * 100.0,
    }
}
