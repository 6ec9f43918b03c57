#![no_main]

use libfuzzer_sys::fuzz_target;
use trlock_core::CursorDescriptor;

fuzz_target!(|data: &[u8]| {
    // Parsing must reject bad input without panicking
    if let Ok(cursor) = CursorDescriptor::from_json(data) {
        // Anything accepted is already validated
        assert!(cursor.validate().is_ok());
        assert!(cursor.x_hot < cursor.width);
        assert!(cursor.y_hot < cursor.height);

        let json = serde_json::to_vec(&cursor).unwrap();
        let again = CursorDescriptor::from_json(&json).unwrap();
        assert_eq!(cursor, again);
    }
});
