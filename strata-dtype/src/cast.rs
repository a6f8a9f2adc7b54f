use std::fmt::Display;

use num_traits::ToPrimitive;
use strata_error::{StrataResult, strata_bail, strata_err};

use crate::{LogicalType, Value};

/// Whether [`cast`] can convert values of type `from` into type `to`.
///
/// Supported conversions are the identity, a string projection of any fixed-width value, and
/// numeric widening or narrowing between any two fixed-width types.
pub fn can_cast(from: LogicalType, to: LogicalType) -> bool {
    from == to
        || (to == LogicalType::Utf8 && from.is_fixed_width())
        || (from.is_fixed_width() && to.is_fixed_width())
}

/// Convert a value into the `target` logical type.
///
/// Narrowing conversions fail when the value does not fit the target, floats are truncated
/// toward zero when converted to integers, and any combination rejected by [`can_cast`] fails
/// with a not-implemented error.
pub fn cast(value: Value, target: LogicalType) -> StrataResult<Value> {
    let source = value.logical_type();
    if source == target {
        return Ok(value);
    }
    if !can_cast(source, target) {
        strata_bail!(NotImplemented: format!("cast to {target}"), source);
    }
    if target == LogicalType::Utf8 {
        return Ok(Value::Utf8(value.to_string().into()));
    }

    match value {
        Value::Bool(v) => numeric_to(u8::from(v), target),
        Value::I8(v) => numeric_to(v, target),
        Value::I16(v) => numeric_to(v, target),
        Value::I32(v) => numeric_to(v, target),
        Value::I64(v) | Value::Timestamp(v) | Value::Duration(v) => numeric_to(v, target),
        Value::U8(v) => numeric_to(v, target),
        Value::U16(v) => numeric_to(v, target),
        Value::U32(v) => numeric_to(v, target),
        Value::U64(v) => numeric_to(v, target),
        Value::F32(v) => numeric_to(v, target),
        Value::F64(v) => numeric_to(v, target),
        other => Err(strata_err!(NotImplemented: format!("cast to {target}"), other.logical_type())),
    }
}

fn numeric_to<N: ToPrimitive + Display + Copy>(n: N, target: LogicalType) -> StrataResult<Value> {
    let converted = match target {
        LogicalType::Bool => n.to_u8().filter(|b| *b <= 1).map(|b| Value::Bool(b == 1)),
        LogicalType::I8 => n.to_i8().map(Value::I8),
        LogicalType::I16 => n.to_i16().map(Value::I16),
        LogicalType::I32 => n.to_i32().map(Value::I32),
        LogicalType::I64 => n.to_i64().map(Value::I64),
        LogicalType::U8 => n.to_u8().map(Value::U8),
        LogicalType::U16 => n.to_u16().map(Value::U16),
        LogicalType::U32 => n.to_u32().map(Value::U32),
        LogicalType::U64 => n.to_u64().map(Value::U64),
        LogicalType::F32 => n.to_f32().map(Value::F32),
        LogicalType::F64 => n.to_f64().map(Value::F64),
        LogicalType::Timestamp => n.to_i64().map(Value::Timestamp),
        LogicalType::Duration => n.to_i64().map(Value::Duration),
        LogicalType::Utf8
        | LogicalType::Binary
        | LogicalType::IndexList
        | LogicalType::WeightedIndexList
        | LogicalType::Vector
        | LogicalType::Matrix
        | LogicalType::Tensor3
        | LogicalType::Tensor4 => {
            strata_bail!(NotImplemented: format!("numeric cast to {target}"), n)
        }
    };
    converted.ok_or_else(|| strata_err!(OutOfRange: "value {n} as {target}"))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{LogicalType, Value, can_cast, cast};

    #[rstest]
    #[case(Value::I8(-3), LogicalType::I64, Value::I64(-3))]
    #[case(Value::U32(300), LogicalType::U16, Value::U16(300))]
    #[case(Value::F64(2.9), LogicalType::I32, Value::I32(2))]
    #[case(Value::F64(-2.9), LogicalType::I32, Value::I32(-2))]
    #[case(Value::Bool(true), LogicalType::F32, Value::F32(1.0))]
    #[case(Value::U8(0), LogicalType::Bool, Value::Bool(false))]
    #[case(Value::Timestamp(1_000), LogicalType::I64, Value::I64(1_000))]
    #[case(Value::I32(5), LogicalType::Duration, Value::Duration(5))]
    fn numeric_conversions(#[case] value: Value, #[case] target: LogicalType, #[case] expected: Value) {
        assert_eq!(cast(value, target).unwrap(), expected);
    }

    #[rstest]
    #[case(Value::I32(300), LogicalType::U8)]
    #[case(Value::I8(-1), LogicalType::U64)]
    #[case(Value::F64(f64::NAN), LogicalType::I64)]
    #[case(Value::U8(2), LogicalType::Bool)]
    fn narrowing_out_of_range(#[case] value: Value, #[case] target: LogicalType) {
        let err = cast(value, target).unwrap_err();
        assert!(err.is_out_of_bounds());
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn string_projection() {
        assert_eq!(cast(Value::I16(-12), LogicalType::Utf8).unwrap(), Value::from("-12"));
        assert_eq!(cast(Value::Bool(false), LogicalType::Utf8).unwrap(), Value::from("false"));
        assert_eq!(cast(Value::from("x"), LogicalType::Utf8).unwrap(), Value::from("x"));
    }

    #[test]
    fn unsupported_combinations() {
        assert!(!can_cast(LogicalType::Utf8, LogicalType::I32));
        assert!(!can_cast(LogicalType::Vector, LogicalType::Matrix));
        assert!(!can_cast(LogicalType::Binary, LogicalType::Utf8));
        assert!(
            cast(Value::from("1"), LogicalType::I32)
                .unwrap_err()
                .is_not_implemented()
        );
        assert!(
            cast(Value::Vector(vec![1.0]), LogicalType::Utf8)
                .unwrap_err()
                .is_not_implemented()
        );
    }
}
