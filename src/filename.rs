//! Output filename bookkeeping.

/// Marker inserted into the names of files this service writes.
pub const ANALYZED_MARKER: &str = "analyzed";

/// Insert `_{addendum}` before the extension of the final path component.
///
/// `posts.json` + `analyzed` becomes `posts_analyzed.json`. A name without
/// an extension gets the suffix appended.
#[must_use]
pub fn append_to_filename(filename: &str, addendum: &str) -> String {
    let name_start = filename.rfind('/').map_or(0, |i| i + 1);
    match filename[name_start..].rfind('.') {
        // A leading dot is a hidden file, not an extension
        Some(dot) if dot > 0 => {
            let split = name_start + dot;
            format!("{}_{addendum}{}", &filename[..split], &filename[split..])
        }
        _ => format!("{filename}_{addendum}"),
    }
}

/// Whether a file was produced by an earlier analysis stage.
#[must_use]
pub fn is_analysis_filename(filename: &str) -> bool {
    filename.to_lowercase().contains(ANALYZED_MARKER)
}

/// Name of the scraped file an analyzed file was derived from.
///
/// Removes the first `_analyzed`, in any case.
#[must_use]
pub fn source_filename(filename: &str) -> String {
    let marker = format!("_{ANALYZED_MARKER}");
    // ASCII lowering keeps byte offsets aligned with the original
    match filename.to_ascii_lowercase().find(&marker) {
        Some(start) => {
            let end = start + marker.len();
            format!("{}{}", &filename[..start], &filename[end..])
        }
        None => filename.to_string(),
    }
}

/// Where a stage writes its output for the given input.
#[must_use]
pub fn output_filename(filename: &str) -> String {
    if is_analysis_filename(filename) {
        filename.to_string()
    } else {
        append_to_filename(filename, ANALYZED_MARKER)
    }
}
