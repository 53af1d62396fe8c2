//! Output formats and `Accept` negotiation

use std::fmt;
use std::str::FromStr;

use mime::Mime;
use serde::{Deserialize, Serialize};

/// Formats an operation can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MimeType {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "text/turtle")]
    Turtle,
}

impl MimeType {
    pub const ALL: [MimeType; 2] = [MimeType::Json, MimeType::Turtle];

    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Json => "application/json",
            MimeType::Turtle => "text/turtle",
        }
    }

    /// `Content-Type` header value for responses in this format
    pub fn content_type(&self) -> &'static str {
        match self {
            MimeType::Json => "application/json",
            MimeType::Turtle => "text/turtle; charset=utf-8",
        }
    }

    fn matches(&self, range: &Mime) -> bool {
        let essence: Mime = match self.as_str().parse() {
            Ok(m) => m,
            Err(_) => return false,
        };
        let type_matches = range.type_() == mime::STAR || range.type_() == essence.type_();
        let subtype_matches =
            range.subtype() == mime::STAR || range.subtype() == essence.subtype();
        type_matches && subtype_matches
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MimeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed: Mime = s.trim().parse().map_err(|_| format!("Invalid mime type: {s}"))?;
        MimeType::ALL
            .into_iter()
            .find(|m| m.as_str() == parsed.essence_str())
            .ok_or_else(|| format!("Unsupported mime type: {s}"))
    }
}

/// Pick the response format for an `Accept` header.
///
/// A missing or blank header selects the first produced type. Otherwise the
/// produced type with the highest quality wins; ties go to the earlier
/// produced type. `None` means nothing acceptable can be produced.
pub fn negotiate(accept: Option<&str>, produces: &[MimeType]) -> Option<MimeType> {
    let accept = match accept.map(str::trim) {
        None | Some("") => return produces.first().copied(),
        Some(accept) => accept,
    };

    let ranges: Vec<(Mime, f32)> = accept
        .split(',')
        .filter_map(|part| part.trim().parse::<Mime>().ok())
        .map(|range| {
            let quality = range
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .unwrap_or(1.0);
            (range, quality)
        })
        .collect();

    let mut best: Option<(MimeType, f32)> = None;
    for candidate in produces {
        let quality = ranges
            .iter()
            .filter(|(range, _)| candidate.matches(range))
            .map(|(range, q)| (specificity(range), *q))
            .max_by_key(|(specificity, _)| *specificity)
            .map(|(_, q)| q);

        if let Some(q) = quality.filter(|q| *q > 0.0) {
            if best.map_or(true, |(_, best_q)| q > best_q) {
                best = Some((*candidate, q));
            }
        }
    }

    best.map(|(mime, _)| mime)
}

/// The most specific matching range decides the quality of a type.
fn specificity(range: &Mime) -> u8 {
    match (range.type_() == mime::STAR, range.subtype() == mime::STAR) {
        (true, _) => 0,
        (false, true) => 1,
        (false, false) => 2,
    }
}
