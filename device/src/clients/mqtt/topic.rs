/// Whether `topic` can be published to: not empty and free of wildcards.
pub fn is_valid_name(topic: &str) -> bool {
    !topic.is_empty() && !topic.contains(['+', '#', '\0'])
}

/// Checks a topic name against a subscription filter with `+` and `#` wildcards.
pub fn matches(filter: &str, topic: &str) -> bool {
    // wildcards never match topics reserved by the broker
    if topic.starts_with('$') && (filter.starts_with('+') || filter.starts_with('#')) {
        return false;
    }

    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_name, matches};

    #[test]
    fn test_exact() {
        assert!(matches("output/weather_station", "output/weather_station"));
        assert!(!matches("output/weather_station", "output/weather"));
        assert!(!matches("output", "output/weather_station"));
    }

    #[test]
    fn test_wildcards() {
        assert!(matches("output/+", "output/weather_station"));
        assert!(!matches("output/+", "output/weather_station/cmd"));
        assert!(matches("output/#", "output/weather_station/cmd"));
        assert!(matches("output/#", "output"));
        assert!(matches("+/+/cmd", "output/weather_station/cmd"));
        assert!(!matches("#", "$SYS/uptime"));
    }

    #[test]
    fn test_topic_names() {
        assert!(is_valid_name("input/weather_station"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("input/+"));
        assert!(!is_valid_name("input/#"));
    }
}
