//! XMP sidecar files
//!
//! One `<basename>.xmp` per image, replaced wholesale on every run. The file
//! is written to a temporary sibling and renamed so a crash never leaves a
//! truncated sidecar.

use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Custom namespace for analysis fields
pub const AI_NAMESPACE: &str = "http://ai-image-analyzer/1.0/";

/// Sidecar path: extension replaced, never appended (`photo.jpg` → `photo.xmp`)
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("xmp")
}

/// Fields rendered into a sidecar
#[derive(Debug, Clone)]
pub struct XmpFields<'a> {
    pub rating: u8,
    pub tags: &'a [String],
    pub description: &'a str,
    pub category: &'a str,
    pub subcategory: &'a str,
    pub score: u8,
    pub score_max: u8,
    pub quality_score: Option<f64>,
    pub analysis_date: DateTime<Utc>,
    pub model_type: &'a str,
}

/// Render the XMP packet
pub fn render(fields: &XmpFields<'_>) -> String {
    let tags_xml: String = fields
        .tags
        .iter()
        .map(|tag| format!("          <rdf:li>{}</rdf:li>\n", escape_xml(tag)))
        .collect();

    let quality_xml = fields
        .quality_score
        .map(|q| format!("      <ai:qualityScore>{:.4}</ai:qualityScore>\n", q))
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
  <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
    <rdf:Description rdf:about=""
        xmlns:xmp="http://ns.adobe.com/xap/1.0/"
        xmlns:dc="http://purl.org/dc/elements/1.1/"
        xmlns:lr="http://ns.adobe.com/lightroom/1.0/"
        xmlns:ai="{ns}">
      <xmp:Rating>{rating}</xmp:Rating>
      <dc:description>
        <rdf:Alt>
          <rdf:li xml:lang="x-default">{description}</rdf:li>
        </rdf:Alt>
      </dc:description>
      <dc:subject>
        <rdf:Bag>
{tags}        </rdf:Bag>
      </dc:subject>
      <lr:hierarchicalSubject>
        <rdf:Bag>
          <rdf:li>{category}|{subcategory}</rdf:li>
        </rdf:Bag>
      </lr:hierarchicalSubject>
      <ai:category>{category}</ai:category>
      <ai:subcategory>{subcategory}</ai:subcategory>
      <ai:score>{score}</ai:score>
      <ai:scoreMax>{score_max}</ai:scoreMax>
{quality}      <ai:analysisDate>{date}</ai:analysisDate>
      <ai:modelType>{model}</ai:modelType>
    </rdf:Description>
  </rdf:RDF>
</x:xmpmeta>
"#,
        ns = AI_NAMESPACE,
        rating = fields.rating,
        description = escape_xml(fields.description),
        tags = tags_xml,
        category = escape_xml(fields.category),
        subcategory = escape_xml(fields.subcategory),
        score = fields.score,
        score_max = fields.score_max,
        quality = quality_xml,
        date = fields.analysis_date.to_rfc3339(),
        model = escape_xml(fields.model_type),
    )
}

/// Write the sidecar for `image_path`, replacing any existing one
///
/// Rendering happens on the caller; the file work runs on the blocking pool.
pub async fn write_sidecar(image_path: &Path, fields: &XmpFields<'_>) -> std::io::Result<PathBuf> {
    let target = sidecar_path(image_path);
    let xml = render(fields);

    let blocking_target = target.clone();
    tokio::task::spawn_blocking(move || replace_file(&blocking_target, xml.as_bytes()))
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))??;

    Ok(target)
}

/// Write `contents` to a temporary sibling of `target`, then rename over it
fn replace_file(target: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = target.with_extension("xmp.tmp");

    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&tmp, target)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Escape text for XML element content and attributes
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\n' | '\r' | '\t') => {}
            c => out.push(c),
        }
    }
    out
}
