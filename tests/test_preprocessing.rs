//! Integration test: user-table preprocessing end-to-end

use nomad_prep::prelude::*;
use nomad_prep::utils::{f64_values, has_column, string_values};
use polars::prelude::*;

fn sample_users() -> DataFrame {
    df!(
        "id" => &["a1", "b2", "c3", "d4"],
        "date_account_created" => &["2010-06-28", "2011-05-25", "2014-01-01", "2013-12-31"],
        "timestamp_first_active" => &[20090319043255i64, 20090523174809, 20140101000000, 20131231235959],
        "date_first_booking" => &[None::<&str>, Some("2011-06-01"), None, None],
        "gender" => &["-unknown-", "MALE", "FEMALE", "-unknown-"],
        "age" => &[Some(5.0), Some(38.0), None, Some(104.0)],
        "language" => &["en", "fr", "-unknown-", "en"],
        "signup_method" => &["facebook", "basic", "basic", "google"]
    )
    .unwrap()
}

#[test]
fn test_cleaning_then_dates_then_encoding() {
    let cleaner = DataCleaner::new(CleaningConfig::default());
    let (mut df, stats) = cleaner.clean_users(sample_users()).unwrap();

    assert_eq!(stats.unknown_replaced, 3, "two genders and one language");
    assert_eq!(stats.ages_nulled, 2, "ages 5 and 104 are implausible");
    assert_eq!(stats.dropped_columns, vec!["date_first_booking".to_string()]);
    assert!(!has_column(&df, "date_first_booking"));
    assert_eq!(
        f64_values(&df, "age").unwrap(),
        vec![None, Some(38.0), None, None]
    );

    let date_stats = DateFeatures::new(&ColumnsConfig::default())
        .apply(&mut df)
        .unwrap();
    assert_eq!(date_stats.unparsed_account_created, 0);
    assert_eq!(date_stats.unparsed_first_active, 0);
    assert_eq!(
        f64_values(&df, "year_account_created").unwrap(),
        vec![Some(2010.0), Some(2011.0), Some(2014.0), Some(2013.0)]
    );
    // 2014-01-01 was a Wednesday, 2013-12-31 a Tuesday
    assert_eq!(
        f64_values(&df, "weekday_account_created").unwrap(),
        vec![Some(0.0), Some(2.0), Some(2.0), Some(1.0)]
    );
    assert_eq!(
        string_values(&df, "date_first_active").unwrap()[3].as_deref(),
        Some("2013-12-31 23:59:59")
    );

    let columns: Vec<String> = ["gender", "language", "signup_method"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut encoder = OneHotEncoder::new();
    let encoded = encoder.fit_transform(&df, &columns).unwrap();

    assert_eq!(encoded.height(), 4, "row count should be preserved");
    assert_eq!(encoder.categories("gender").unwrap(), &["FEMALE", "MALE"]);
    assert!(!has_column(&encoded, "gender_-unknown-"));
    assert_eq!(
        f64_values(&encoded, "gender_MALE").unwrap(),
        vec![Some(0.0), Some(1.0), Some(0.0), Some(0.0)]
    );
    assert_eq!(
        f64_values(&encoded, "language_en").unwrap(),
        vec![Some(1.0), Some(0.0), Some(0.0), Some(1.0)]
    );
    for name in &columns {
        assert!(!has_column(&encoded, name), "{name} should be replaced");
    }
}

#[test]
fn test_encoding_missing_column_is_fatal() {
    let mut encoder = OneHotEncoder::new();
    let result = encoder.fit_transform(&sample_users(), &["most_used_device".to_string()]);
    assert!(matches!(result, Err(PrepError::ColumnNotFound(name)) if name == "most_used_device"));
}

#[test]
fn test_session_cleaning_covers_every_string_column() {
    let sessions = df!(
        "user_id" => &["a1", "a1", "b2"],
        "action" => &["show", "-unknown-", "search"],
        "device_type" => &["-unknown-", "iPhone", "-unknown-"],
        "secs_elapsed" => &[Some(10.0), None, Some(3.0)]
    )
    .unwrap();

    let cleaner = DataCleaner::new(CleaningConfig::default());
    let (df, stats) = cleaner.clean_sessions(sessions).unwrap();

    assert_eq!(stats.unknown_replaced, 3);
    assert_eq!(
        string_values(&df, "device_type").unwrap(),
        vec![None, Some("iPhone".to_string()), None]
    );
    assert_eq!(df.height(), 3);
}
