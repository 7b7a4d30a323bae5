//! The console surface.
//!
//! `console.log` formats each argument with the engine stringifier,
//! joins with single spaces, and writes one newline-terminated record to
//! the host-provided sink.

use crate::interp::Interpreter;
use crate::stringify::display_value;
use crate::value::{ObjectData, Value};

use super::native;

pub(crate) fn install(interp: &mut Interpreter) {
    let console = ObjectData::new();
    {
        let mut data = console.borrow_mut();
        for name in ["log", "info", "debug", "error", "warn"] {
            data.properties.insert(
                name.to_string(),
                native(name, 0, |interp, _this, args| {
                    let parts: Vec<String> =
                        args.iter().map(|value| display_value(interp, value)).collect();
                    let line = parts.join(" ");
                    let sink = std::rc::Rc::clone(&interp.sink);
                    sink.borrow_mut().write_line(&line);
                    Ok(Value::Undefined)
                }),
            );
        }
        data.frozen = true;
        data.sealed = true;
    }
    interp
        .globals
        .declare("console", Value::Object(console), false);
}
