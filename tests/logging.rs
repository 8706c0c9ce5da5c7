//! Test for logging is isolated in its own module to avoid messing with the global settings of
//! other, non-logging related tests.
mod common;

use log::Level;
use odbc_statement::{
    DataType, SessionOptions, StatementEngine, Value,
    handles::{DiagnosticResult, Diagnostics, SqlChar, State, log_diagnostics},
};

use common::{Driver, MockSession};

#[test]
fn emit_a_warning_for_each_diagnostic() {
    // Given a handle which would have two diagnostics
    struct DiagnosticStub;

    impl DiagnosticStub {
        fn write_message(text: &[u8], buf: &mut [SqlChar]) -> DiagnosticResult {
            let len = text.len().min(buf.len());
            buf[..len].copy_from_slice(&text[..len]);
            DiagnosticResult {
                state: State(*b"01000"),
                native_error: 0,
                text_length: text.len() as i16,
            }
        }
    }

    impl Diagnostics for DiagnosticStub {
        fn diagnostic_record(
            &self,
            rec_number: i16,
            message_text: &mut [SqlChar],
        ) -> Option<DiagnosticResult> {
            match rec_number {
                1 => Some(Self::write_message(b"first diagnostic", message_text)),
                2 => Some(Self::write_message(b"second diagnostic", message_text)),
                _ => None,
            }
        }
    }

    testing_logger::setup();

    // When logging the diagnostics of the handle
    log_diagnostics(&DiagnosticStub);

    // Both diagnostics are logged as warnings
    testing_logger::validate(|captured_logs| {
        assert_eq!(captured_logs.len(), 2);
        assert_eq!(captured_logs[0].level, Level::Warn);
        assert!(captured_logs[0].body.contains("first diagnostic"));
        assert_eq!(captured_logs[1].level, Level::Warn);
        assert!(captured_logs[1].body.contains("second diagnostic"));
    });
}

#[test]
fn fetch_with_info_logs_warning() {
    // Given a driver which truncates a value during fetch
    let mut driver = Driver::new(SessionOptions::default()).with_result_set(
        &[("title", DataType::Varchar { length: 64 })],
        vec![vec![Value::from("Dune")]],
    );
    driver.fetch_warning = Some(State::STRING_DATA_RIGHT_TRUNCATION);
    let session = MockSession::new(driver);
    let mut engine = StatementEngine::new(&session).unwrap();
    engine.compile("SELECT title FROM books", &mut []).unwrap();
    engine.bind_and_execute(&mut []).unwrap();

    testing_logger::setup();

    // When fetching the row
    assert!(engine.has_next().unwrap());

    // Then the warning is logged, but fetching succeeds
    testing_logger::validate(|captured_logs| {
        let warnings: Vec<_> = captured_logs
            .iter()
            .filter(|log| log.level == Level::Warn)
            .collect();
        assert_eq!(1, warnings.len());
        assert!(warnings[0].body.contains("01004"));
        assert!(warnings[0].body.contains("String data, right truncated"));
    });
}

#[test]
fn failing_native_sql_translation_is_logged() {
    // Given a driver which fails to fetch and never manages to translate the statement
    let mut driver = Driver::new(SessionOptions::default())
        .with_result_set(&[("a", DataType::Integer)], vec![vec![Value::I32(1)]]);
    driver.fetch_failure = Some(State(*b"08S01"));
    driver.native_sql_never_fits = true;
    let session = MockSession::new(driver);
    let mut engine = StatementEngine::new(&session).unwrap();
    engine.compile("SELECT a FROM t", &mut []).unwrap();
    engine.bind_and_execute(&mut []).unwrap();

    testing_logger::setup();

    // When fetching
    let error = engine.has_next().unwrap_err();

    // Then the error is still reported, with the native SQL missing
    assert!(error.to_string().contains("Native SQL statement: <unavailable>"));
    testing_logger::validate(|captured_logs| {
        assert!(captured_logs.iter().any(|log| {
            log.level == Level::Warn
                && log
                    .body
                    .contains("Could not translate statement into native SQL")
        }));
    });
}

#[test]
fn ignored_close_errors_are_logged_as_debug() {
    let session = MockSession::new(Driver::new(SessionOptions::default()));
    let mut engine = StatementEngine::new(&session).unwrap();
    engine.compile("DELETE FROM books", &mut []).unwrap();

    testing_logger::setup();

    engine.clear().unwrap();

    testing_logger::validate(|captured_logs| {
        let ignored: Vec<_> = captured_logs
            .iter()
            .filter(|log| log.body.starts_with("Ignoring error closing the cursor"))
            .collect();
        assert_eq!(1, ignored.len());
        assert_eq!(Level::Debug, ignored[0].level);
        assert!(ignored[0].body.contains("24000"));
    });
}
