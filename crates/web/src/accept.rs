use mime::Mime;
use std::cmp::Ordering;
use std::str::FromStr;

/// Parsed `Accept` header. Supports quality values and wildcard ranges;
/// negotiation prefers higher quality, then the more specific range, then
/// client order.
#[derive(Debug, Clone)]
pub struct Accept {
    ranges: Vec<MediaRange>,
}

#[derive(Debug, Clone)]
struct MediaRange {
    mime: Mime,
    quality: f32,
}

impl Accept {
    /// A missing header means the client takes anything. Unparseable
    /// entries are skipped; a header with no valid entry matches nothing.
    pub(crate) fn parse(header: Option<&str>) -> Self {
        let Some(header) = header.map(str::trim).filter(|h| !h.is_empty()) else {
            return Self { ranges: vec![MediaRange { mime: mime::STAR_STAR, quality: 1.0 }] };
        };

        let mut ranges = Vec::new();
        for part in header.split(',') {
            let part = part.trim();
            let Ok(mime) = Mime::from_str(part) else { continue };
            let quality = mime
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            ranges.push(MediaRange { mime, quality });
        }
        Self { ranges }
    }

    /// Picks the candidate the client prefers, or `None` when nothing on
    /// offer is acceptable.
    pub fn negotiate<'a>(&self, candidates: &'a [Mime]) -> Option<&'a Mime> {
        let mut best: Option<(usize, f32, usize)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let Some((quality, range_index)) = self.preference_for(candidate) else { continue };
            let replace = match best {
                None => true,
                Some((_, best_quality, best_range)) => match quality.partial_cmp(&best_quality) {
                    Some(Ordering::Greater) => true,
                    Some(Ordering::Equal) => range_index < best_range,
                    _ => false,
                },
            };
            if replace {
                best = Some((index, quality, range_index));
            }
        }
        best.map(|(index, _, _)| &candidates[index])
    }

    /// True when the client would take this type at all.
    pub fn accepts(&self, candidate: &Mime) -> bool {
        self.negotiate(std::slice::from_ref(candidate)).is_some()
    }

    /// Quality the client assigned to this candidate via its most specific
    /// matching range. `None` when no range matches or the match is an
    /// explicit refusal (`q=0`).
    fn preference_for(&self, candidate: &Mime) -> Option<(f32, usize)> {
        let mut found: Option<(f32, u8, usize)> = None;
        for (index, range) in self.ranges.iter().enumerate() {
            let Some(specificity) = match_specificity(&range.mime, candidate) else { continue };
            let replace = match found {
                None => true,
                Some((quality, best_specificity, _)) => {
                    specificity > best_specificity
                        || (specificity == best_specificity && range.quality > quality)
                }
            };
            if replace {
                found = Some((range.quality, specificity, index));
            }
        }
        match found {
            Some((quality, _, index)) if quality > 0.0 => Some((quality, index)),
            _ => None,
        }
    }
}

/// How precisely a range pins down a candidate: exact pair beats subtype
/// wildcard beats full wildcard. `None` when the range does not cover the
/// candidate at all.
fn match_specificity(range: &Mime, candidate: &Mime) -> Option<u8> {
    if range.type_() == mime::STAR {
        return Some(0);
    }
    if range.type_() != candidate.type_() {
        return None;
    }
    if range.subtype() == mime::STAR {
        return Some(1);
    }
    (range.subtype() == candidate.subtype()).then_some(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(header: &str) -> Accept {
        Accept::parse(Some(header))
    }

    #[test]
    fn missing_header_takes_first_candidate() {
        let accept = Accept::parse(None);
        let candidates = [mime::APPLICATION_JSON, mime::TEXT_HTML];
        assert_eq!(accept.negotiate(&candidates), Some(&mime::APPLICATION_JSON));
    }

    #[test]
    fn quality_orders_candidates() {
        let accept = accept("application/json;q=0.9, text/html");
        let candidates = [mime::APPLICATION_JSON, mime::TEXT_HTML];
        assert_eq!(accept.negotiate(&candidates), Some(&mime::TEXT_HTML));
    }

    #[test]
    fn specific_range_overrides_wildcard_quality() {
        let accept = accept("text/*;q=0.3, text/plain;q=0.9");
        assert_eq!(
            accept.negotiate(&[mime::TEXT_HTML, mime::TEXT_PLAIN]),
            Some(&mime::TEXT_PLAIN)
        );
    }

    #[test]
    fn zero_quality_is_a_refusal() {
        let accept = accept("application/json;q=0, */*");
        assert!(!accept.accepts(&mime::APPLICATION_JSON));
        assert!(accept.accepts(&mime::TEXT_HTML));
    }

    #[test]
    fn wildcard_subtype_matches_family() {
        let accept = accept("image/*");
        assert!(accept.accepts(&mime::IMAGE_PNG));
        assert!(!accept.accepts(&mime::TEXT_HTML));
    }

    #[test]
    fn client_order_breaks_quality_ties() {
        let accept = accept("text/html, application/json");
        let candidates = [mime::APPLICATION_JSON, mime::TEXT_HTML];
        assert_eq!(accept.negotiate(&candidates), Some(&mime::TEXT_HTML));
    }

    #[test]
    fn garbage_header_matches_nothing() {
        let accept = accept("not a mime type at all");
        assert!(!accept.accepts(&mime::TEXT_HTML));
    }
}
