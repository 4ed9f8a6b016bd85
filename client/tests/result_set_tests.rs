mod support;

use std::collections::VecDeque;
use std::sync::Arc;

use arrow_array::types::Int64Type;
use arrow_array::{
    ArrayRef, BinaryArray, Decimal128Array, Int64Array, ListArray, RecordBatch, StringArray,
    TimestampNanosecondArray,
};
use async_trait::async_trait;
use quarry_client::error::{DriverError, Result};
use quarry_client::result_set::{BatchSource, ResultSetView};
use quarry_client::session::{OPT_SESSION_TIMEZONE, SessionConfig};
use quarry_proto::{CompletionStatus, TransferMode};
use std::collections::HashMap;

use support::{BatchEncoder, ScriptedStub, exec_inline, exec_status, int_batch_of, query_status};

/// 2024-01-01T12:00:00Z
const NOON: i64 = 1_704_110_400_000_000_000;

struct VecSource(VecDeque<RecordBatch>);

#[async_trait]
impl BatchSource for VecSource {
    async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        Ok(self.0.pop_front())
    }

    fn close(&mut self) {}
}

fn la_session() -> SessionConfig {
    let options: HashMap<String, String> = [(
        OPT_SESSION_TIMEZONE.to_string(),
        "America/Los_Angeles".to_string(),
    )]
    .into();
    SessionConfig::from_options(&options).expect("config")
}

fn mixed_batch() -> RecordBatch {
    let ts_naive: ArrayRef = Arc::new(TimestampNanosecondArray::from(vec![Some(NOON), None]));
    let ts_utc: ArrayRef =
        Arc::new(TimestampNanosecondArray::from(vec![Some(NOON), Some(NOON)]).with_timezone("UTC"));
    let name: ArrayRef = Arc::new(StringArray::from(vec![Some("alpha"), None]));
    let amount: ArrayRef = Arc::new(
        Decimal128Array::from(vec![Some(12345_i128), Some(-50_i128)])
            .with_precision_and_scale(10, 2)
            .expect("decimal"),
    );
    let tags: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Int64Type, _, _>(vec![
        Some(vec![Some(1), Some(2), Some(3)]),
        Some(vec![]),
    ]));
    let raw: ArrayRef = Arc::new(BinaryArray::from(vec![
        Some(b"hello".as_slice()),
        Some(b"world".as_slice()),
    ]));
    RecordBatch::try_from_iter(vec![
        ("ts_naive", ts_naive),
        ("ts_utc", ts_utc),
        ("name", name),
        ("amount", amount),
        ("tags", tags),
        ("raw", raw),
    ])
    .expect("batch")
}

fn mixed_view() -> ResultSetView<VecSource> {
    ResultSetView::new(
        VecSource(VecDeque::from([mixed_batch()])),
        &la_session(),
    )
}

#[tokio::test]
async fn naive_timestamp_with_user_calendar() {
    let mut view = mixed_view();
    assert!(view.next().await.expect("row"));

    // the calendar differs from the session zone: convert out of UTC
    let converted = view
        .get_timestamp_with_calendar(1, Some(chrono_tz::Europe::Berlin))
        .expect("value")
        .expect("non-null");
    assert_eq!(converted.to_string(), "2024-01-01 13:00:00");

    // a calendar matching the session zone is framework-injected: ignored
    let ignored = view
        .get_timestamp_with_calendar(1, Some(chrono_tz::America::Los_Angeles))
        .expect("value")
        .expect("non-null");
    assert_eq!(ignored.to_string(), "2024-01-01 12:00:00");

    // naive text carries no zone indicator
    assert_eq!(
        view.get_string(1).expect("text").as_deref(),
        Some("2024-01-01T12:00:00.000")
    );
}

#[tokio::test]
async fn tagged_timestamp_with_user_calendar() {
    let mut view = mixed_view();
    assert!(view.next().await.expect("row"));

    let converted = view
        .get_timestamp_with_calendar(2, Some(chrono_tz::Europe::Berlin))
        .expect("value")
        .expect("non-null");
    assert_eq!(converted.to_string(), "2024-01-01 13:00:00");

    assert_eq!(
        view.get_string(2).expect("text").as_deref(),
        Some("2024-01-01T12:00:00.000Z")
    );
}

#[tokio::test]
async fn null_observation_via_the_cursor() {
    let mut view = mixed_view();
    assert!(view.next().await.expect("row 1"));
    assert_eq!(view.get_string(3).expect("text").as_deref(), Some("alpha"));
    assert!(!view.was_null());

    assert!(view.next().await.expect("row 2"));
    assert!(view.get_string(3).expect("null text").is_none());
    assert!(view.was_null());
    assert!(view.get_timestamp(1).expect("null ts").is_none());
    assert!(view.was_null());
    // a non-null read clears the flag
    assert_eq!(view.get_string(6).expect("text").as_deref(), Some("world"));
    assert!(!view.was_null());
}

#[tokio::test]
async fn decimal_bytes_and_array_reads() {
    let mut view = mixed_view();
    assert!(view.next().await.expect("row"));

    let amount = view.get_decimal(4).expect("decimal").expect("non-null");
    assert_eq!(amount.to_string(), "123.45");
    assert_eq!(
        view.get_string(4).expect("text").as_deref(),
        Some("123.45")
    );

    assert_eq!(
        view.get_bytes(6).expect("bytes").expect("non-null"),
        b"hello".to_vec()
    );
    assert_eq!(view.get_string(6).expect("text").as_deref(), Some("hello"));

    let tags = view.get_array(5).expect("array").expect("non-null");
    assert_eq!(tags.len(), 3);
    let tail = tags.slice(2, 2).expect("slice");
    let ints: &Int64Array = tail.as_any().downcast_ref().expect("ints");
    assert_eq!(ints.values(), &[2, 3]);

    assert!(view.next().await.expect("row 2"));
    let empty = view.get_array(5).expect("array").expect("non-null");
    assert!(empty.is_empty());
    assert_eq!(empty.slice(1, 0).expect("empty slice").len(), 0);
}

#[tokio::test]
async fn lookup_by_name_and_range_checks() {
    let mut view = mixed_view();
    assert!(view.next().await.expect("row"));
    assert_eq!(view.column_index("amount").expect("index"), 4);
    let err = view.column_index("nope").expect_err("unknown column");
    assert!(matches!(err, DriverError::NotFound { .. }));
    assert!(matches!(view.get_int(0), Err(DriverError::Range(_))));
    assert!(matches!(view.get_int(7), Err(DriverError::Range(_))));
}

#[tokio::test]
async fn by_name_getters() {
    let mut view = mixed_view();
    assert!(view.next().await.expect("row"));
    assert_eq!(
        view.get_string_by_name("name").expect("text").as_deref(),
        Some("alpha")
    );
    assert!(matches!(
        view.get_long_by_name("unknown"),
        Err(DriverError::NotFound { .. })
    ));
}

#[tokio::test]
async fn cursor_spans_batches_and_skips_empty_ones() {
    let batches = VecDeque::from([int_batch_of(2, 0), int_batch_of(0, 0), int_batch_of(3, 10)]);
    let mut view = ResultSetView::new(VecSource(batches), &SessionConfig::default());
    let mut values = Vec::new();
    while view.next().await.expect("row") {
        values.push(view.get_long(1).expect("value"));
    }
    assert_eq!(values, vec![0, 1, 10, 11, 12]);
    assert!(!view.next().await.expect("drained"));
}

#[tokio::test]
async fn cursor_over_a_full_query() {
    let stub = ScriptedStub::new();
    let mut encoder = BatchEncoder::new();
    stub.push_exec(vec![
        exec_status(query_status("q-1", CompletionStatus::Finished, 1, 4)),
        exec_inline(encoder.schema_and_batch_bytes(&int_batch_of(4, 0))),
    ]);

    let client = quarry_client::QueryClient::new(stub.clone(), SessionConfig::default());
    let mut view = client.query("SELECT v FROM t", TransferMode::Adaptive);
    let mut rows = 0;
    while view.next().await.expect("row") {
        assert_eq!(view.get_long(1).expect("value"), rows);
        rows += 1;
    }
    assert_eq!(rows, 4);
}
