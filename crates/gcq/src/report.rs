//! Lookup results and cache state, as text or JSON

use facesource::FaceSource;
use glyphcache::{CacheError, CacheManager, StatsSnapshot};
use serde::Serialize;

/// Outcome of one character code
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookup {
    pub code: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyph: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Lookup {
    pub fn found(code: u32, glyph: u32) -> Self {
        Self {
            code,
            glyph: Some(glyph),
            error: None,
        }
    }

    pub fn failed(code: u32, error: &CacheError) -> Self {
        Self {
            code,
            glyph: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub face: u32,
    pub subtable: i32,
    pub lookups: Vec<Lookup>,
    pub nodes: usize,
    pub cur_weight: usize,
    pub max_weight: usize,
    pub stats: StatsSnapshot,
}

impl Report {
    pub fn new<S: FaceSource>(
        face: u32,
        subtable: i32,
        lookups: Vec<Lookup>,
        manager: &CacheManager<S>,
    ) -> Self {
        Self {
            face,
            subtable,
            lookups,
            nodes: manager.len(),
            cur_weight: manager.cur_weight(),
            max_weight: manager.max_weight(),
            stats: manager.stats().snapshot(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for lookup in &self.lookups {
            let result = match (&lookup.glyph, &lookup.error) {
                (Some(0), _) => "(no glyph)".to_string(),
                (Some(glyph), _) => glyph.to_string(),
                (None, Some(error)) => format!("error: {}", error),
                (None, None) => "?".to_string(),
            };
            out.push_str(&format!("U+{:04X} -> {}\n", lookup.code, result));
        }

        out.push_str(&format!(
            "{} nodes, {}/{} bytes, {} hits, {} misses, {} evictions ({:.1}% hit rate)\n",
            self.nodes,
            self.cur_weight,
            self.max_weight,
            self.stats.hits,
            self.stats.misses,
            self.stats.evictions,
            self.stats.hit_ratio * 100.0
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(lookups: Vec<Lookup>) -> Report {
        Report {
            face: 1,
            subtable: -1,
            lookups,
            nodes: 2,
            cur_weight: 1500,
            max_weight: 200_000,
            stats: StatsSnapshot {
                hits: 3,
                misses: 1,
                inserts: 2,
                evictions: 0,
                invalidations: 0,
                hit_ratio: 0.75,
            },
        }
    }

    #[test]
    fn test_render_text() {
        let text = report(vec![
            Lookup::found(0x41, 36),
            Lookup::found(0x61, 0),
            Lookup::failed(0x42, &CacheError::FontUnavailable("face 1".to_string())),
        ])
        .render_text();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "U+0041 -> 36");
        assert_eq!(lines[1], "U+0061 -> (no glyph)");
        assert!(lines[2].starts_with("U+0042 -> error: "));
        assert_eq!(
            lines[3],
            "2 nodes, 1500/200000 bytes, 3 hits, 1 misses, 0 evictions (75.0% hit rate)"
        );
    }

    #[test]
    fn test_json_report() {
        let json = serde_json::to_value(report(vec![Lookup::found(0x41, 36)])).unwrap();

        assert_eq!(json["lookups"][0]["glyph"], 36);
        assert!(json["lookups"][0].get("error").is_none());
        assert_eq!(json["stats"]["hits"], 3);
        assert_eq!(json["max_weight"], 200_000);
    }
}
