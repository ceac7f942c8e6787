//! 命令行输入解析

/// `--waypoint LAT,LONG[,ALT]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaypointArg {
    pub lat: f64,
    pub long: f64,
    pub alt: Option<f64>,
}

/// clap `value_parser`
///
/// 只检查格式与有限性，范围交给航路点队列校验。
pub fn parse_waypoint(s: &str) -> Result<WaypointArg, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if !(2..=3).contains(&parts.len()) {
        return Err(format!("expected LAT,LONG[,ALT], got '{}'", s));
    }

    let number = |name: &str, text: &str| -> Result<f64, String> {
        let value: f64 = text
            .parse()
            .map_err(|_| format!("invalid {} '{}'", name, text))?;
        if !value.is_finite() {
            return Err(format!("{} must be finite", name));
        }
        Ok(value)
    };

    Ok(WaypointArg {
        lat: number("latitude", parts[0])?,
        long: number("longitude", parts[1])?,
        alt: parts.get(2).map(|a| number("altitude", a)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_waypoint() {
        assert_eq!(
            parse_waypoint("48.9, -123.7").unwrap(),
            WaypointArg {
                lat: 48.9,
                long: -123.7,
                alt: None
            }
        );
        assert_eq!(parse_waypoint("1,2,3").unwrap().alt, Some(3.0));
    }

    #[test]
    fn test_parse_waypoint_rejects_malformed() {
        assert!(parse_waypoint("48.9").is_err());
        assert!(parse_waypoint("1,2,3,4").is_err());
        assert!(parse_waypoint("north,2").is_err());
        assert!(parse_waypoint("NaN,2").is_err());
    }
}
