//! Parser for the provider's `;`-delimited export text.

use crate::types::ResultLine;

/// Field separator used by the export formats.
pub const FIELD_SEPARATOR: char = ';';

/// Parse export text into result lines, preserving line order.
///
/// Lines with fewer than two fields are dropped. A third field becomes the
/// snippet; anything after it is ignored.
pub fn parse_export(text: &str) -> Vec<ResultLine> {
    let lines: Vec<ResultLine> = text.lines().filter_map(parse_line).collect();
    tracing::trace!(count = lines.len(), "export lines parsed");
    lines
}

fn parse_line(line: &str) -> Option<ResultLine> {
    let mut fields = line.split(FIELD_SEPARATOR);
    let domain = fields.next()?;
    let rank = fields.next()?;
    let snippet = fields.next().unwrap_or_default();
    Some(ResultLine {
        domain: domain.to_owned(),
        rank: rank.to_owned(),
        snippet: snippet.to_owned(),
    })
}
