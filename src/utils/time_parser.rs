use std::time::Duration;

pub struct TimeParser;

impl TimeParser {
    /// 解析时间间隔字符串，支持的单位：
    /// - ms, s, m, h, d
    /// - 组合格式：1h30m, 1d12h, 2m30s
    pub fn parse_duration(input: &str) -> Result<Duration, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err("时间间隔不能为空".to_string());
        }

        let mut total = Duration::ZERO;
        let mut remaining = input;

        while !remaining.is_empty() {
            // 提取数字
            let digits = remaining
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(remaining.len());
            if digits == 0 {
                return Err(format!("无效的时间格式: '{}'", input));
            }
            let num: u64 = remaining[..digits]
                .parse()
                .map_err(|_| format!("无效的数字: '{}'", &remaining[..digits]))?;
            remaining = &remaining[digits..];

            // 提取单位
            let unit_len = remaining
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(remaining.len());
            if unit_len == 0 {
                return Err(format!("缺少时间单位，数字 '{}' 后应跟时间单位", num));
            }
            let unit = &remaining[..unit_len];
            remaining = &remaining[unit_len..];

            let step = match unit.to_lowercase().as_str() {
                "ms" => Duration::from_millis(num),
                "s" => Duration::from_secs(num),
                "m" => Duration::from_secs(num.saturating_mul(60)),
                "h" => Duration::from_secs(num.saturating_mul(3600)),
                "d" => Duration::from_secs(num.saturating_mul(86400)),
                _ => return Err(format!("不支持的时间单位: '{}'", unit)),
            };
            total = total.saturating_add(step);
        }

        if total.is_zero() {
            return Err("时间间隔不能为零".to_string());
        }

        Ok(total)
    }

    /// 解析失败时返回 `default`，并把错误原因交给调用方记录
    pub fn parse_duration_or(input: &str, default: Duration) -> (Duration, Option<String>) {
        match Self::parse_duration(input) {
            Ok(duration) => (duration, None),
            Err(e) => (default, Some(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_units() {
        assert_eq!(
            TimeParser::parse_duration("250ms").unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(
            TimeParser::parse_duration("30s").unwrap(),
            Duration::from_secs(30)
        );
        assert_eq!(
            TimeParser::parse_duration("5m").unwrap(),
            Duration::from_secs(300)
        );
        assert_eq!(
            TimeParser::parse_duration("1h").unwrap(),
            Duration::from_secs(3600)
        );
        assert_eq!(
            TimeParser::parse_duration("2d").unwrap(),
            Duration::from_secs(2 * 86400)
        );
    }

    #[test]
    fn test_parse_combined() {
        assert_eq!(
            TimeParser::parse_duration("1h30m").unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(
            TimeParser::parse_duration(" 1d2h30m ").unwrap(),
            Duration::from_secs(86400 + 2 * 3600 + 30 * 60)
        );
        assert_eq!(
            TimeParser::parse_duration("1s500ms").unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(TimeParser::parse_duration("").is_err());
        assert!(TimeParser::parse_duration("abc").is_err());
        assert!(TimeParser::parse_duration("10").is_err());
        assert!(TimeParser::parse_duration("10x").is_err());
        assert!(TimeParser::parse_duration("1h 30m").is_err());
        assert!(TimeParser::parse_duration("0s").is_err());
    }

    #[test]
    fn test_parse_or_default() {
        let fallback = Duration::from_secs(3600);
        let (duration, err) = TimeParser::parse_duration_or("bogus", fallback);
        assert_eq!(duration, fallback);
        assert!(err.is_some());

        let (duration, err) = TimeParser::parse_duration_or("10s", fallback);
        assert_eq!(duration, Duration::from_secs(10));
        assert!(err.is_none());
    }
}
