use fieldlink_codec::{convert, parse_hex, Converted, Value};

use crate::cmd::ConvertArgs;
use crate::exit::{codec_error, CliResult, SUCCESS};
use crate::output::{print_converted, OutputFormat};

pub fn run(args: ConvertArgs, format: OutputFormat) -> CliResult<i32> {
    let converted = convert_args(&args)?;
    print_converted(&converted, format);
    Ok(SUCCESS)
}

fn convert_args(args: &ConvertArgs) -> CliResult<Converted> {
    let values: Vec<Value> = match &args.hex {
        Some(hex) => {
            let raw = parse_hex(hex).map_err(|err| codec_error("--hex is not valid hex", err))?;
            vec![Value::Bytes(raw)]
        }
        None => args.values.iter().map(|v| Value::Text(v.trim().to_string())).collect(),
    };

    convert(&values, args.from, args.to, args.order, args.position, args.endian)
        .map_err(|err| codec_error("conversion failed", err))
}

#[cfg(test)]
mod tests {
    use fieldlink_codec::{Endian, ValueKind, WordOrder};

    use super::*;

    fn args(values: &[&str], from: ValueKind, to: ValueKind, order: WordOrder) -> ConvertArgs {
        ConvertArgs {
            from,
            to,
            values: values.iter().map(|v| v.to_string()).collect(),
            hex: None,
            order,
            endian: Endian::Little,
            position: None,
        }
    }

    #[test]
    fn registers_to_uint32() {
        let a = args(&["1", "2"], ValueKind::UInt16Array, ValueKind::UInt32, WordOrder::Abcd);
        let out = convert_args(&a).expect("conversion should succeed");
        assert_eq!(out, Converted::Many(vec![Value::U32(0x0002_0001)]));
    }

    #[test]
    fn position_selects_one_value() {
        let kind = ValueKind::UInt16Array;
        let mut a = args(&["7", "8", "9"], kind, kind, WordOrder::Abcd);
        a.position = Some(1);
        assert_eq!(convert_args(&a).unwrap(), Converted::Single(Value::U16(8)));
    }

    #[test]
    fn hex_input_is_passed_through() {
        let mut a = args(&[], ValueKind::ByteArray, ValueKind::UInt16Array, WordOrder::Abcd);
        a.hex = Some("01 00 02 00".to_string());
        assert_eq!(
            convert_args(&a).unwrap(),
            Converted::Many(vec![Value::U16(1), Value::U16(2)])
        );
    }

    #[test]
    fn bad_value_is_data_invalid() {
        let a = args(&["70000"], ValueKind::UInt16Array, ValueKind::UInt16Array, WordOrder::Abcd);
        let err = convert_args(&a).unwrap_err();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }
}
