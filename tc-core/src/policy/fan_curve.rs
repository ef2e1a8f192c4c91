//! Fan curve normalization and firmware encoding
//!
//! Firmware takes exactly eight points as 16 bytes: the eight temperatures
//! followed by the eight duty percentages.

use crate::constants::curve;
use crate::error::{Result, ThermoctlError};

use super::CurvePoint;

/// Sort, de-duplicate and clamp a curve into a shape firmware accepts
///
/// Temperatures are strictly increasing (duplicates bumped by 1 °C) and
/// speeds never decrease as temperature rises.
pub fn normalize_curve(points: &[CurvePoint]) -> Result<Vec<CurvePoint>> {
    if points.len() != curve::POINTS {
        return Err(ThermoctlError::InvalidCurve(format!(
            "expected {} points, got {}",
            curve::POINTS,
            points.len()
        )));
    }

    let mut sorted: Vec<CurvePoint> = points
        .iter()
        .map(|p| CurvePoint {
            temperature_c: p.temperature_c.clamp(curve::MIN_TEMP_C, curve::MAX_TEMP_C),
            fan_percent: p.fan_percent.clamp(curve::MIN_PERCENT, curve::MAX_PERCENT),
        })
        .collect();
    sorted.sort_by_key(|p| p.temperature_c);

    for i in 1..sorted.len() {
        let prev = sorted[i - 1];
        let point = &mut sorted[i];
        if point.temperature_c <= prev.temperature_c {
            point.temperature_c = prev.temperature_c + 1;
        }
        point.fan_percent = point.fan_percent.max(prev.fan_percent);
    }

    if let Some(last) = sorted.last() {
        if last.temperature_c > curve::MAX_TEMP_C {
            return Err(ThermoctlError::InvalidCurve(format!(
                "temperatures exceed {}°C after de-duplication",
                curve::MAX_TEMP_C
            )));
        }
    }
    Ok(sorted)
}

/// Normalize and encode a curve into the firmware payload
pub fn encode_fan_curve(points: &[CurvePoint]) -> Result<[u8; curve::PAYLOAD_LEN]> {
    let normalized = normalize_curve(points)?;
    let mut payload = [0u8; curve::PAYLOAD_LEN];
    for (i, point) in normalized.iter().enumerate() {
        payload[i] = to_byte(point.temperature_c)?;
        payload[curve::POINTS + i] = to_byte(point.fan_percent)?;
    }
    Ok(payload)
}

fn to_byte(value: i32) -> Result<u8> {
    u8::try_from(value).map_err(|_| ThermoctlError::InvalidCurve(format!("value {} does not fit a byte", value)))
}
