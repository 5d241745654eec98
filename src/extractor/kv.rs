// file: src/extractor/kv.rs
// description: generic key:value / key=value splitter used as last-resort extraction

use std::collections::BTreeMap;

/// Splits each line on `;` (else tab), then each part on its first `:` (else
/// first `=`). Parts with an empty key or value are ignored; later duplicates win.
pub fn parse_key_values(text: &str) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let separator = [';', '\t'].into_iter().find(|sep| line.contains(*sep));

        match separator {
            Some(sep) => {
                for part in line.split(sep).map(str::trim).filter(|p| !p.is_empty()) {
                    if let Some((key, value)) = split_pair(part) {
                        result.insert(key.to_string(), value.to_string());
                    }
                }
            }
            None => {
                if let Some((key, value)) = split_pair(line) {
                    result.insert(key.to_string(), value.to_string());
                }
            }
        }
    }

    result
}

fn split_pair(part: &str) -> Option<(&str, &str)> {
    for delimiter in [':', '='] {
        if let Some((key, value)) = part.split_once(delimiter) {
            let (key, value) = (key.trim(), value.trim());
            if !key.is_empty() && !value.is_empty() {
                return Some((key, value));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_semicolon_separated() {
        let kvs = parse_key_values("src_ip:192.168.1.1; dst_ip:8.8.8.8; protocol:UDP");
        assert_eq!(kvs.get("src_ip").map(String::as_str), Some("192.168.1.1"));
        assert_eq!(kvs.get("dst_ip").map(String::as_str), Some("8.8.8.8"));
        assert_eq!(kvs.get("protocol").map(String::as_str), Some("UDP"));
    }

    #[test]
    fn test_tab_and_equals() {
        let kvs = parse_key_values("src_port=5353\tdst_port=53\n\nprotocol = UDP");
        assert_eq!(kvs.len(), 3);
        assert_eq!(kvs["dst_port"], "53");
        assert_eq!(kvs["protocol"], "UDP");
    }

    #[test]
    fn test_empty_sides_fall_through() {
        // Empty value after ':' lets '=' be tried.
        let kvs = parse_key_values("a:\nb=x:\n:c");
        assert_eq!(kvs.len(), 1);
        assert_eq!(kvs["b"], "x:");
    }

    #[test]
    fn test_later_duplicate_wins() {
        let kvs = parse_key_values("k:1\nk:2");
        assert_eq!(kvs["k"], "2");
    }
}
