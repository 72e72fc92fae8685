use std::path::PathBuf;

use clap::ValueEnum;
use sartool_lib::error::SarError;
use sartool_lib::live::{AntennaBackoff, BackoffStatus, LiveSarState};
use sartool_lib::modem::ModemAntenna;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Radio {
    Wifi,
    Lte,
}

/// Where `getconfig`/`setconfig` read and write the provisioning variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSelector {
    Uefi,
    Directory(PathBuf),
}

pub fn parse_store(raw: &str) -> Result<StoreSelector, String> {
    if raw.is_empty() {
        return Err("store must be `uefi` or a directory".to_string());
    }
    if raw.eq_ignore_ascii_case("uefi") {
        Ok(StoreSelector::Uefi)
    } else {
        Ok(StoreSelector::Directory(PathBuf::from(raw)))
    }
}

/// Hex with an optional `0x` prefix, as antenna indices and MIMO masks are given.
pub fn parse_hex(raw: &str) -> Result<u32, SarError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    u32::from_str_radix(digits, 16).map_err(|_| SarError::InvalidArgument(format!("{raw:?} is not a hex number")))
}

fn parse_decimal<T: std::str::FromStr>(raw: &str) -> Result<T, SarError> {
    raw.parse()
        .map_err(|_| SarError::InvalidArgument(format!("{raw:?} is not a decimal number")))
}

fn pairs(args: &[String]) -> Result<Vec<(&str, &str)>, SarError> {
    if args.len() % 2 != 0 {
        return Err(SarError::InvalidArgument(
            "antenna and backoff indices must come in pairs".to_string(),
        ));
    }
    if args.len() > 4 {
        return Err(SarError::InvalidArgument(format!(
            "at most 2 antenna/backoff pairs are supported, got {}",
            args.len() / 2
        )));
    }
    Ok(args.chunks_exact(2).map(|p| (p[0].as_str(), p[1].as_str())).collect())
}

/// `on <mimoMask> <antenna> <backoff> [<antenna> <backoff>]` or `off [<antenna> <backoff>]...`
pub fn wifi_request(args: &[String]) -> Result<LiveSarState, SarError> {
    let (switch, rest) = args
        .split_first()
        .ok_or_else(|| SarError::InvalidArgument("expected `on` or `off`".to_string()))?;

    let (backoff_status, mimo_config_type, rest) = if switch.eq_ignore_ascii_case("on") {
        let (mask, rest) = rest
            .split_first()
            .ok_or_else(|| SarError::InvalidArgument("`on` needs a MIMO mask".to_string()))?;
        if rest.is_empty() {
            return Err(SarError::InvalidArgument(
                "`on` needs at least one antenna/backoff pair".to_string(),
            ));
        }
        (BackoffStatus::Enabled, parse_hex(mask)?, rest)
    } else if switch.eq_ignore_ascii_case("off") {
        (BackoffStatus::Disabled, 0, rest)
    } else {
        return Err(SarError::InvalidArgument(format!(
            "expected `on` or `off`, got {switch:?}"
        )));
    };

    let antennas = pairs(rest)?
        .into_iter()
        .map(|(antenna, backoff)| Ok(AntennaBackoff::new(parse_hex(antenna)?, parse_decimal(backoff)?)))
        .collect::<Result<Vec<_>, SarError>>()?;

    Ok(LiveSarState::new(backoff_status, mimo_config_type, antennas))
}

/// One or two decimal `<antenna> <backoff>` pairs.
pub fn lte_request(args: &[String]) -> Result<Vec<ModemAntenna>, SarError> {
    let pairs = pairs(args)?;
    if pairs.is_empty() {
        return Err(SarError::InvalidArgument(
            "expected 1 or 2 antenna/backoff pairs".to_string(),
        ));
    }
    pairs
        .into_iter()
        .map(|(antenna, backoff)| Ok(ModemAntenna::new(parse_decimal(antenna)?, parse_decimal(backoff)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_store_selector() {
        assert_eq!(parse_store("UEFI").unwrap(), StoreSelector::Uefi);
        assert_eq!(
            parse_store("./out").unwrap(),
            StoreSelector::Directory(PathBuf::from("./out"))
        );
        assert!(parse_store("").is_err());
    }

    #[test]
    fn test_hex_with_and_without_prefix() {
        assert_eq!(parse_hex("0x3").unwrap(), 3);
        assert_eq!(parse_hex("1f").unwrap(), 0x1f);
        assert!(parse_hex("0xzz").is_err());
    }

    #[test]
    fn test_wifi_on() {
        let state = wifi_request(&words("On 0x3 0x1 5 2 7")).unwrap();
        assert_eq!(state.backoff_status, BackoffStatus::Enabled);
        assert_eq!(state.mimo_config_type, 3);
        assert_eq!(
            state.antennas,
            vec![AntennaBackoff::new(1, 5), AntennaBackoff::new(2, 7)]
        );
    }

    #[test]
    fn test_wifi_off_without_pairs() {
        let state = wifi_request(&words("off")).unwrap();
        assert_eq!(state.backoff_status, BackoffStatus::Disabled);
        assert!(state.antennas.is_empty());
    }

    #[test]
    fn test_wifi_rejects_bad_shapes() {
        for line in ["", "maybe", "on", "on 0x3", "on 0x3 0x1", "off 1 2 3 4 5 6", "on 0x3 0x1 ten"] {
            assert!(
                matches!(wifi_request(&words(line)), Err(SarError::InvalidArgument(_))),
                "{line:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_lte_pairs_are_decimal() {
        assert_eq!(
            lte_request(&words("10 3")).unwrap(),
            vec![ModemAntenna::new(10, 3)]
        );
        assert!(lte_request(&words("")).is_err());
        assert!(lte_request(&words("1 2 3")).is_err());
        assert!(lte_request(&words("0x1 2")).is_err());
    }
}
