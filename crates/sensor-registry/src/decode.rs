//! Register decoding: one [`RegisterSpec`] applied to one manufacturer payload.
//!
//! Numeric fields go through a fixed pipeline: read the byte span covering
//! `bits + shift`, then mask, shift and trim to `bits`, scale (true division),
//! bias, translation, and finally the invalidation sentinel check.

use crate::error::FieldError;
use crate::types::{FieldType, Numeric, RegisterSpec, SensorValue};

/// Decode a register, logging and swallowing per-field problems.
pub fn decode_field(spec: &RegisterSpec, payload: &[u8]) -> Option<SensorValue> {
    match try_decode_field(spec, payload) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(field = %spec.name, "{e}, ignoring it");
            None
        }
    }
}

/// Decode a register. `Ok(None)` means the value matched its invalidation sentinel.
pub fn try_decode_field(
    spec: &RegisterSpec,
    payload: &[u8],
) -> Result<Option<SensorValue>, FieldError> {
    let value = match spec.field_type {
        FieldType::String => Some(SensorValue::Text(load_str(spec, payload)?)),
        FieldType::Boolean => load_number(spec, payload)?.map(|n| SensorValue::Bool(n.as_f64() != 0.0)),
        FieldType::Double => load_number(spec, payload)?.map(|n| SensorValue::F64(n.as_f64())),
        _ => load_number(spec, payload)?.map(Numeric::into_value),
    };
    Ok(value)
}

/// Fixed-length UTF-8 string field.
pub fn load_str(spec: &RegisterSpec, payload: &[u8]) -> Result<String, FieldError> {
    let bits = spec.bits.ok_or_else(|| FieldError::NoWidth {
        field: spec.name.clone(),
    })?;
    let bytes = span(spec, payload, ((bits + 7) >> 3) as usize)?;
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|source| FieldError::Utf8 {
            field: spec.name.clone(),
            source,
        })
}

/// Numeric (or boolean) field, before the final type coercion.
pub fn load_number(spec: &RegisterSpec, payload: &[u8]) -> Result<Option<Numeric>, FieldError> {
    let bits = spec.effective_bits().ok_or_else(|| FieldError::NoWidth {
        field: spec.name.clone(),
    })?;
    let size = ((bits + spec.shift.unwrap_or(0) + 7) >> 3) as usize;
    let bytes = span(spec, payload, size)?;
    let big_endian = spec.flags.big_endian;

    let mut value = if spec.field_type == FieldType::Double && spec.bits.is_none() {
        let word: [u8; 8] = bytes
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| FieldError::NoWidth {
                field: spec.name.clone(),
            })?;
        Numeric::Float(if big_endian {
            f64::from_be_bytes(word)
        } else {
            f64::from_le_bytes(word)
        })
    } else {
        let mut raw = read_int(bytes, big_endian, spec.field_type.is_signed());
        if let Some(mask) = spec.mask {
            raw &= i128::from(mask);
        }
        if let Some(shift) = spec.shift {
            raw = (raw >> shift) & ((1i128 << bits) - 1);
        }
        Numeric::Int(raw)
    };

    // A zero scale or bias is treated as absent.
    if let Some(scale) = spec.scale.filter(|s| *s != 0.0) {
        value = Numeric::Float(value.as_f64() / scale);
    }
    if let Some(bias) = spec.bias.filter(|b| *b != 0.0) {
        value = add_bias(value, bias);
    }
    if let Some(xlate) = &spec.xlate {
        value = xlate.apply(value);
    }
    if spec.flags.invalid {
        if let Some(inval) = spec.inval {
            if same_number(value, inval) {
                return Ok(None);
            }
        }
    }
    Ok(Some(value))
}

fn span<'a>(spec: &RegisterSpec, payload: &'a [u8], size: usize) -> Result<&'a [u8], FieldError> {
    spec.offset
        .checked_add(size)
        .and_then(|end| payload.get(spec.offset..end))
        .ok_or_else(|| FieldError::Truncated {
            field: spec.name.clone(),
            offset: spec.offset,
            needed: size,
            available: payload.len(),
        })
}

/// Read up to 16 bytes as one integer, sign-extending from the span width.
fn read_int(bytes: &[u8], big_endian: bool, signed: bool) -> i128 {
    let fold = |acc: u128, b: &u8| (acc << 8) | u128::from(*b);
    let acc = if big_endian {
        bytes.iter().fold(0u128, fold)
    } else {
        bytes.iter().rev().fold(0u128, fold)
    };
    let width = bytes.len() * 8;
    if signed && width > 0 && width < 128 && (acc >> (width - 1)) & 1 == 1 {
        acc as i128 - (1i128 << width)
    } else {
        acc as i128
    }
}

fn add_bias(value: Numeric, bias: f64) -> Numeric {
    match value {
        Numeric::Int(v) if bias.fract() == 0.0 => match v.checked_add(bias as i128) {
            Some(sum) => Numeric::Int(sum),
            None => Numeric::Float(v as f64 + bias),
        },
        other => Numeric::Float(other.as_f64() + bias),
    }
}

fn same_number(value: Numeric, sentinel: f64) -> bool {
    match value {
        Numeric::Int(v) => v as f64 == sentinel,
        Numeric::Float(v) => {
            let tolerance = 1e-9 * v.abs().max(sentinel.abs()).max(1.0);
            (v - sentinel).abs() <= tolerance
        }
    }
}
