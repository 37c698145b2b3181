//! Command dispatch: parsed RESP frames in, reply frames out.
//!
//! The dispatcher is purely synchronous — all blocking it can do is wait on
//! the per-dispenser lock inside the registry, never on network I/O.

use numera::{
    Charset, ConfigPatch, Durability, Error, Kind, MonotonicMode, Registry, UuidFormat,
};

use crate::resp::Value;

/// A reply plus whether the connection should close after sending it.
pub struct Response {
    pub value: Value,
    pub close: bool,
}

impl Response {
    fn reply(value: Value) -> Self {
        Self {
            value,
            close: false,
        }
    }
}

fn error(message: impl Into<String>) -> Response {
    Response::reply(Value::Error(format!("ERR {}", message.into())))
}

fn engine_error(err: &Error) -> Response {
    Response::reply(Value::Error(format!("ERR {err}")))
}

/// Routes one client request to the registry.
pub fn dispatch(registry: &Registry, request: &Value) -> Response {
    let Value::Array(items) = request else {
        return error("invalid command format");
    };
    if items.is_empty() {
        return error("invalid command format");
    }

    let mut args = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Bulk(text) => args.push(text.as_str()),
            _ => return error("invalid argument type"),
        }
    }

    let command = args[0];
    if command.eq_ignore_ascii_case("hset") {
        handle_hset(registry, &args[1..])
    } else if command.eq_ignore_ascii_case("get") {
        handle_get(registry, &args[1..])
    } else if command.eq_ignore_ascii_case("info") {
        handle_info(registry, &args[1..])
    } else if command.eq_ignore_ascii_case("del") {
        handle_del(registry, &args[1..])
    } else if command.eq_ignore_ascii_case("ping") {
        Response::reply(Value::Simple("PONG".into()))
    } else if command.eq_ignore_ascii_case("quit") {
        Response {
            value: Value::Simple("OK".into()),
            close: true,
        }
    } else {
        error(format!("unknown command '{command}'"))
    }
}

/// `HSET name field value [field value]...` — create or reconfigure.
fn handle_hset(registry: &Registry, args: &[&str]) -> Response {
    if args.len() < 3 || args.len() % 2 == 0 {
        return error("wrong number of arguments for 'hset' command");
    }

    let name = args[0];
    let fields = &args[1..];
    let mut patch = ConfigPatch::default();

    for pair in fields.chunks(2) {
        let field = pair[0].to_ascii_lowercase();
        let value = pair[1];

        match field.as_str() {
            "type" => {
                let Ok(kind) = value.parse::<u8>().map_err(|_| ()).and_then(|n| {
                    Kind::try_from(n).map_err(|_| ())
                }) else {
                    return error("invalid type value");
                };
                patch.kind = Some(kind);
            }
            "length" => match value.parse() {
                Ok(length) => patch.length = Some(length),
                Err(_) => return error("invalid length value"),
            },
            "starting" => match value.parse() {
                Ok(starting) => patch.starting = Some(starting),
                Err(_) => return error("invalid starting value"),
            },
            "step" => match value.parse() {
                Ok(step) => patch.step = Some(step),
                Err(_) => return error("invalid step value"),
            },
            "machine_id" | "machine-id" => match value.parse() {
                Ok(machine_id) => patch.machine_id = Some(machine_id),
                Err(_) => return error("invalid machine_id value"),
            },
            "datacenter_id" | "datacenter-id" => match value.parse() {
                Ok(datacenter_id) => patch.datacenter_id = Some(datacenter_id),
                Err(_) => return error("invalid datacenter_id value"),
            },
            "incr_mode" | "incr-mode" => match value.to_ascii_lowercase().as_str() {
                "fixed" => patch.incr_mode = Some(MonotonicMode::Fixed),
                "sequence" => patch.incr_mode = Some(MonotonicMode::Sequence),
                _ => return error("invalid incr_mode value, valid values: fixed, sequence"),
            },
            "charset" => match value.to_ascii_lowercase().as_str() {
                "hex" => patch.charset = Some(Charset::Hex),
                "base62" => patch.charset = Some(Charset::Base62),
                _ => return error("invalid charset value, valid values: hex, base62"),
            },
            "uuid_format" | "uuid-format" => match value.to_ascii_lowercase().as_str() {
                "standard" => patch.uuid_format = Some(UuidFormat::Standard),
                "compact" => patch.uuid_format = Some(UuidFormat::Compact),
                _ => return error("invalid uuid_format value, valid values: standard, compact"),
            },
            "unique_check" | "unique-check" => match value.to_ascii_lowercase().as_str() {
                "1" | "t" | "true" => patch.unique_check = Some(true),
                "0" | "f" | "false" => patch.unique_check = Some(false),
                _ => return error("invalid unique_check value"),
            },
            "unique_cache_size" | "unique-cache-size" => match value.parse() {
                Ok(size) => patch.unique_cache_size = Some(size),
                Err(_) => return error("invalid unique_cache_size value"),
            },
            "auto_disk" | "auto-disk" => {
                match Durability::parse(value.to_ascii_lowercase().as_str()) {
                    Some(durability) => patch.auto_disk = Some(durability),
                    None => {
                        return error(format!(
                            "invalid auto_disk value '{value}', valid values: memory, pre-base, \
                             pre-checkpoint, elegant_close, pre_close"
                        ));
                    }
                }
            }
            _ => return error(format!("unknown field '{field}'")),
        }
    }

    if patch.kind.is_none() {
        return error("type field is required");
    }

    match registry.configure(name, patch) {
        Ok(_) => Response::reply(Value::Integer((fields.len() / 2) as i64)),
        Err(err) => engine_error(&err),
    }
}

/// `GET name` — emit the next identifier.
fn handle_get(registry: &Registry, args: &[&str]) -> Response {
    if args.len() != 1 {
        return error("wrong number of arguments for 'get' command");
    }
    match registry.next(args[0]) {
        Ok(identifier) => Response::reply(Value::Bulk(identifier)),
        Err(err) => engine_error(&err),
    }
}

/// `DEL name` — remove a dispenser and its snapshot entry.
fn handle_del(registry: &Registry, args: &[&str]) -> Response {
    if args.len() != 1 {
        return error("wrong number of arguments for 'del' command");
    }
    match registry.delete(args[0]) {
        Ok(true) => Response::reply(Value::Integer(1)),
        Ok(false) => Response::reply(Value::Integer(0)),
        Err(err) => engine_error(&err),
    }
}

/// `INFO name` — newline-separated `key:value` description.
fn handle_info(registry: &Registry, args: &[&str]) -> Response {
    if args.len() != 1 {
        return error("wrong number of arguments for 'info' command");
    }
    let name = args[0];
    let Some(dispenser) = registry.get(name) else {
        return engine_error(&Error::UnknownDispenser);
    };

    let config = dispenser.config();
    let stats = dispenser.stats();

    let info = match config.kind {
        Kind::NumericRandom => format!(
            "name:{name}\ntype:1 (Numeric Random)\nlength:{}\nunique_check:{}\nauto_disk:{}\ngenerated:{}",
            config.length, config.unique_check, config.auto_disk, stats.generated
        ),
        Kind::NumericMonotonic => {
            let mut info = format!("name:{name}\ntype:2 (Numeric Monotonic)\nmode:{}\n", config.mode());
            if config.mode() == MonotonicMode::Fixed {
                info.push_str(&format!("length:{}\n", config.length));
            }
            info.push_str(&format!(
                "starting:{}\nstep:{}\ncurrent:{}\nauto_disk:{}\ngenerated:{}\nwasted:{}\nwaste_rate:{:.2}%",
                config.starting,
                config.step,
                dispenser.current(),
                config.auto_disk,
                stats.generated,
                stats.wasted,
                stats.waste_rate
            ));
            info
        }
        Kind::AlphanumericRandom => format!(
            "name:{name}\ntype:3 (Alphanumeric Random)\nlength:{}\ncharset:{}\nauto_disk:{}\ngenerated:{}",
            config.length,
            config.charset.unwrap_or(Charset::Hex),
            config.auto_disk,
            stats.generated
        ),
        Kind::Snowflake => format!(
            "name:{name}\ntype:4 (Snowflake)\nmachine_id:{}\ndatacenter_id:{}\nauto_disk:{}\ngenerated:{}",
            config.machine_id, config.datacenter_id, config.auto_disk, stats.generated
        ),
        Kind::Uuid => format!(
            "name:{name}\ntype:5 (UUID)\nformat:{}\nauto_disk:{}\ngenerated:{}",
            config.uuid_format.unwrap_or(UuidFormat::Standard),
            config.auto_disk,
            stats.generated
        ),
    };

    Response::reply(Value::Bulk(info))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use numera::{MemoryStore, SnapshotStore};

    use super::*;

    fn registry() -> Registry {
        Registry::new(Arc::new(MemoryStore::new()) as Arc<dyn SnapshotStore>)
    }

    fn command(parts: &[&str]) -> Value {
        Value::Array(parts.iter().map(|p| Value::Bulk((*p).to_string())).collect())
    }

    fn expect_bulk(response: Response) -> String {
        match response.value {
            Value::Bulk(text) => text,
            other => panic!("expected bulk, got {other:?}"),
        }
    }

    #[test]
    fn ping_pongs() {
        let registry = registry();
        let response = dispatch(&registry, &command(&["ping"]));
        assert_eq!(response.value, Value::Simple("PONG".into()));
        assert!(!response.close);
    }

    #[test]
    fn quit_closes_the_connection() {
        let registry = registry();
        let response = dispatch(&registry, &command(&["QUIT"]));
        assert_eq!(response.value, Value::Simple("OK".into()));
        assert!(response.close);
    }

    #[test]
    fn hset_replies_with_field_count() {
        let registry = registry();
        let response = dispatch(
            &registry,
            &command(&[
                "hset", "a", "type", "2", "incr_mode", "sequence", "starting", "0", "step", "1",
                "auto_disk", "memory",
            ]),
        );
        assert_eq!(response.value, Value::Integer(5));
    }

    #[test]
    fn sequence_dispenser_counts_up() {
        let registry = registry();
        dispatch(
            &registry,
            &command(&["hset", "a", "type", "2", "incr_mode", "sequence", "auto_disk", "memory"]),
        );
        for expected in ["0", "1", "2"] {
            let value = expect_bulk(dispatch(&registry, &command(&["get", "a"])));
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn get_unknown_dispenser_errors() {
        let registry = registry();
        let response = dispatch(&registry, &command(&["get", "missing"]));
        assert_eq!(
            response.value,
            Value::Error("ERR dispenser not found".into())
        );
    }

    #[test]
    fn hset_requires_type() {
        let registry = registry();
        let response = dispatch(&registry, &command(&["hset", "a", "length", "5"]));
        assert_eq!(response.value, Value::Error("ERR type field is required".into()));
    }

    #[test]
    fn hset_rejects_unknown_fields_and_bad_values() {
        let registry = registry();
        let response = dispatch(&registry, &command(&["hset", "a", "bogus", "1"]));
        assert_eq!(response.value, Value::Error("ERR unknown field 'bogus'".into()));

        let response = dispatch(&registry, &command(&["hset", "a", "type", "abc"]));
        assert_eq!(response.value, Value::Error("ERR invalid type value".into()));

        let response = dispatch(
            &registry,
            &command(&["hset", "a", "type", "2", "auto_disk", "sometimes"]),
        );
        assert!(matches!(response.value, Value::Error(ref e) if e.contains("auto_disk")));
    }

    #[test]
    fn immutable_reconfiguration_names_the_fields() {
        let registry = registry();
        dispatch(
            &registry,
            &command(&["hset", "g", "type", "2", "incr_mode", "sequence", "starting", "100",
                       "auto_disk", "memory"]),
        );
        for _ in 0..5 {
            dispatch(&registry, &command(&["get", "g"]));
        }

        let response = dispatch(&registry, &command(&["hset", "g", "type", "1", "length", "7"]));
        match response.value {
            Value::Error(message) => {
                assert!(message.contains("type"), "missing field name: {message}");
            }
            other => panic!("expected error, got {other:?}"),
        }

        // State untouched by the failed reconfiguration.
        assert_eq!(expect_bulk(dispatch(&registry, &command(&["get", "g"]))), "105");
    }

    #[test]
    fn del_is_idempotent() {
        let registry = registry();
        dispatch(&registry, &command(&["hset", "a", "type", "5"]));
        assert_eq!(
            dispatch(&registry, &command(&["del", "a"])).value,
            Value::Integer(1)
        );
        assert_eq!(
            dispatch(&registry, &command(&["del", "a"])).value,
            Value::Integer(0)
        );
    }

    #[test]
    fn info_reports_monotonic_progress() {
        let registry = registry();
        dispatch(
            &registry,
            &command(&["hset", "b", "type", "2", "length", "8", "starting", "10001000"]),
        );
        dispatch(&registry, &command(&["get", "b"]));

        let info = expect_bulk(dispatch(&registry, &command(&["info", "b"])));
        assert!(info.contains("name:b"));
        assert!(info.contains("type:2"));
        assert!(info.contains("mode:fixed"));
        assert!(info.contains("current:10001001"));
        assert!(info.contains("generated:1"));
        assert!(info.contains("wasted:"));
        assert!(info.contains("waste_rate:"));
    }

    #[test]
    fn info_reports_uuid_format() {
        let registry = registry();
        dispatch(&registry, &command(&["hset", "f", "type", "5", "uuid_format", "compact"]));
        let info = expect_bulk(dispatch(&registry, &command(&["info", "f"])));
        assert!(info.contains("type:5"));
        assert!(info.contains("format:compact"));
    }

    #[test]
    fn numeric_random_exhausts_at_eighty_percent() {
        let registry = registry();
        dispatch(&registry, &command(&["hset", "d", "type", "1", "length", "2"]));
        for _ in 0..72 {
            expect_bulk(dispatch(&registry, &command(&["get", "d"])));
        }
        assert_eq!(
            dispatch(&registry, &command(&["get", "d"])).value,
            Value::Error("ERR number range exhausted".into())
        );
    }

    #[test]
    fn unknown_command_errors() {
        let registry = registry();
        let response = dispatch(&registry, &command(&["flushall"]));
        assert_eq!(
            response.value,
            Value::Error("ERR unknown command 'flushall'".into())
        );
    }

    #[test]
    fn non_array_requests_are_rejected() {
        let registry = registry();
        let response = dispatch(&registry, &Value::Simple("get a".into()));
        assert_eq!(
            response.value,
            Value::Error("ERR invalid command format".into())
        );
    }
}
