//! Daily task import: a worked example of a hand-configured importer
//!
//! Task sheets are exported as CSV with Portuguese column headers. Each row
//! is one task slot, identified by its date and start time, so re-importing
//! a sheet updates the slots it already knows about.
//!
//! Dates appear as `"Thu 03"`: only the day of month is meaningful, and it
//! is resolved against `today` to the most recent date on or before it
//! with that day.

use crate::adapter::CsvAdapter;
use crate::importer::{
    parse_time, ConfigError, ExtractError, Extractor, FieldSource, ImporterConfig,
};
use crate::record::{FieldDef, FieldKind, FieldValue, ModelSchema, Record};
use crate::storage::{RecordFilter, RecordStore, StorageResult};
use chrono::{Datelike, Months, NaiveDate};
use std::sync::Arc;
use tracing::info;

pub const CATEGORY_MODEL: &str = "category";
pub const TASK_MODEL: &str = "task";

/// Sheet label → category slug
pub const CATEGORY_SLUGS: &[(&str, &str)] = &[
    ("Desenv", "desenvolvimento"),
    ("Rede", "rede"),
    ("Suporte", "suporte"),
];

const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Desenvolvimento", "desenvolvimento"),
    ("Rede", "rede"),
    ("Suporte", "suporte"),
];

const TOTAL_FIELDS: &[(&str, &str)] = &[
    ("total_created", "Criadas"),
    ("total_worked", "Trabalhadas"),
    ("total_closed", "Fechadas"),
    ("total_to_test", "To Test"),
    ("total_open", "Open"),
];

pub fn category_schema() -> Arc<ModelSchema> {
    Arc::new(
        ModelSchema::new(CATEGORY_MODEL)
            .with_field(FieldDef::new("name", FieldKind::text_max(64)))
            .with_field(FieldDef::new("slug", FieldKind::text_max(64))),
    )
}

pub fn task_schema() -> Arc<ModelSchema> {
    let small_count = FieldKind::Int {
        min: Some(0),
        max: Some(i16::MAX as i64),
    };
    let mut schema = ModelSchema::new(TASK_MODEL)
        .with_field(FieldDef::new("category", FieldKind::reference(CATEGORY_MODEL)))
        .with_field(FieldDef::new("date", FieldKind::Date))
        .with_field(FieldDef::new("start_time", FieldKind::Time))
        .with_field(FieldDef::new("end_time", FieldKind::Time))
        .with_field(FieldDef::new("duration", FieldKind::Time))
        .with_field(FieldDef::new("description", FieldKind::text_max(124)))
        .with_field(FieldDef::new("template", FieldKind::text_max(124)))
        .with_field(FieldDef::new("temp_1", FieldKind::text_max(64)))
        .with_field(FieldDef::new("temp_2", FieldKind::text_max(64)));
    for (name, _) in TOTAL_FIELDS {
        schema = schema.with_field(FieldDef::new(*name, small_count.clone()).nullable());
    }
    Arc::new(schema)
}

/// Create the default categories that are not stored yet
pub fn ensure_categories(store: &dyn RecordStore) -> StorageResult<usize> {
    let schema = category_schema();
    let mut created = 0;
    for (name, slug) in DEFAULT_CATEGORIES {
        let filter = RecordFilter::new().eq("slug", *slug);
        if store.find_one(&schema, &filter)?.is_some() {
            continue;
        }
        let mut category = Record::new(Arc::clone(&schema));
        category.set("name", FieldValue::from(*name))?;
        category.set("slug", FieldValue::from(*slug))?;
        store.save(&mut category)?;
        created += 1;
    }
    if created > 0 {
        info!(created, "default categories created");
    }
    Ok(created)
}

/// The date on or before `today` whose day of month is `day`.
///
/// When `day` is still ahead in the current month the previous month is
/// used. Returns `None` when that month has no such day.
pub fn resolve_day(today: NaiveDate, day: u32) -> Option<NaiveDate> {
    let month = if today.day() < day {
        today.checked_sub_months(Months::new(1))?
    } else {
        today
    };
    month.with_day(day)
}

/// Importer configuration for daily task sheets
pub fn task_importer(
    store: Arc<dyn RecordStore>,
    today: NaiveDate,
) -> Result<ImporterConfig<CsvAdapter>, ConfigError> {
    let mut builder = ImporterConfig::builder(task_schema())
        .field("category")
        .map("category", "Categoria")
        .extractor("category", move |src: &FieldSource<'_, CsvAdapter>| {
            parse_category(store.as_ref(), src)
        })
        .field("date")
        .map("date", "Date")
        .extractor("date", move |src: &FieldSource<'_, CsvAdapter>| {
            parse_date(src, today)
        });

    let times: Extractor<CsvAdapter> = Arc::new(parse_clock);
    for (field, column) in [("start_time", "Inicio"), ("end_time", "Fim"), ("duration", "Duração")] {
        builder = builder
            .field(field)
            .map(field, column)
            .shared_extractor(field, Arc::clone(&times));
    }

    for (field, column) in [
        ("description", "Descrição"),
        ("template", "Modelo"),
        ("temp_1", "Temp1"),
        ("temp_2", "Temp2"),
    ] {
        builder = builder.field(field).map(field, column);
    }

    let totals: Extractor<CsvAdapter> = Arc::new(parse_total);
    for (field, column) in TOTAL_FIELDS {
        builder = builder
            .field(*field)
            .map(*field, *column)
            .shared_extractor(*field, Arc::clone(&totals));
    }

    builder.unique(["date", "start_time"]).build()
}

fn parse_category(
    store: &dyn RecordStore,
    src: &FieldSource<'_, CsvAdapter>,
) -> Result<FieldValue, ExtractError> {
    let Some(label) = src.raw() else {
        return Ok(FieldValue::Null);
    };
    let Some((_, slug)) = CATEGORY_SLUGS.iter().find(|(l, _)| *l == label) else {
        return Ok(FieldValue::Null);
    };

    let filter = RecordFilter::new().eq("slug", *slug);
    let category = store
        .find_one(&category_schema(), &filter)
        .map_err(|source| ExtractError::Lookup {
            field: src.field.to_string(),
            source,
        })?;
    Ok(category
        .and_then(|c| c.reference())
        .map(FieldValue::Reference)
        .unwrap_or_default())
}

fn parse_date(src: &FieldSource<'_, CsvAdapter>, today: NaiveDate) -> Result<FieldValue, ExtractError> {
    let raw = src.require()?;
    let mut parts = raw.split_whitespace();
    let day = match (parts.next(), parts.next(), parts.next()) {
        (Some(_weekday), Some(day), None) => day
            .parse::<u32>()
            .map_err(|e| src.invalid(raw.as_str(), e))?,
        _ => return Err(src.invalid(raw.as_str(), "expected \"<weekday> <day>\"")),
    };
    resolve_day(today, day)
        .map(FieldValue::Date)
        .ok_or_else(|| src.invalid(raw.as_str(), format!("no day {} near {}", day, today)))
}

// Unparsable times are kept as text so the store rejects the row on save.
fn parse_clock(src: &FieldSource<'_, CsvAdapter>) -> Result<FieldValue, ExtractError> {
    Ok(match src.raw() {
        Some(raw) => parse_time(&raw).map(FieldValue::Time).unwrap_or(FieldValue::Text(raw)),
        None => FieldValue::Null,
    })
}

fn parse_total(src: &FieldSource<'_, CsvAdapter>) -> Result<FieldValue, ExtractError> {
    let n = src.raw().and_then(|raw| raw.parse::<i64>().ok()).unwrap_or(0);
    Ok(FieldValue::Int(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::Importer;
    use crate::storage::{OpenStore, SqliteStore};
    use chrono::NaiveTime;
    use std::io::Write;

    const HEADER: &str =
        "Categoria,Date,Inicio,Fim,Duração,Descrição,Modelo,Temp1,Temp2,Criadas,Trabalhadas,Fechadas,To Test,Open\n";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sheet(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HEADER.as_bytes()).unwrap();
        for row in rows {
            writeln!(file, "{}", row).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn store_with_categories() -> Arc<dyn RecordStore> {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        ensure_categories(store.as_ref()).unwrap();
        store
    }

    #[test]
    fn resolve_day_stays_in_month_when_day_has_passed() {
        assert_eq!(resolve_day(date(2024, 3, 15), 3), Some(date(2024, 3, 3)));
        assert_eq!(resolve_day(date(2024, 3, 15), 15), Some(date(2024, 3, 15)));
    }

    #[test]
    fn resolve_day_goes_back_across_month_and_year() {
        assert_eq!(resolve_day(date(2024, 3, 2), 28), Some(date(2024, 2, 28)));
        assert_eq!(resolve_day(date(2024, 1, 5), 20), Some(date(2023, 12, 20)));
        // February 2023 has no 30th
        assert_eq!(resolve_day(date(2023, 3, 1), 30), None);
    }

    #[test]
    fn ensure_categories_is_idempotent() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        assert_eq!(ensure_categories(store.as_ref()).unwrap(), 3);
        assert_eq!(ensure_categories(store.as_ref()).unwrap(), 0);
        assert_eq!(store.count(CATEGORY_MODEL).unwrap(), 3);
    }

    #[test]
    fn imports_a_sheet() {
        let store = store_with_categories();
        let file = sheet(&[
            "Desenv,Thu 03,08:00,09:30,01:30,Fix login,T1,a,b,2,3,1,n/a,",
            "Rede,Fri 04,10:00,10:15,00:15,Switch,T2,c,d,,,,,",
        ]);
        let config = task_importer(store.clone(), date(2024, 10, 7)).unwrap();
        let mut importer = Importer::new(config, CsvAdapter::new(), store.clone(), file.path());

        let summary = importer.parse().unwrap();
        assert_eq!(summary.created, 2);
        assert!(importer.errors().is_empty());

        let tasks = store.find(&task_schema(), &RecordFilter::new()).unwrap();
        let first = &tasks[0];
        assert_eq!(first.get("date"), Some(&FieldValue::Date(date(2024, 10, 3))));
        assert_eq!(
            first.get("start_time"),
            Some(&FieldValue::Time(NaiveTime::from_hms_opt(8, 0, 0).unwrap()))
        );
        assert_eq!(first.get("total_created"), Some(&FieldValue::Int(2)));
        assert_eq!(first.get("total_to_test"), Some(&FieldValue::Int(0)));
        assert_eq!(tasks[1].get("total_open"), Some(&FieldValue::Int(0)));

        let category = first.get("category").and_then(FieldValue::as_reference).unwrap();
        assert_eq!(category.model, CATEGORY_MODEL);
        let desenv = store
            .find_one(&category_schema(), &RecordFilter::new().eq("slug", "desenvolvimento"))
            .unwrap()
            .unwrap();
        assert_eq!(Some(category.id), desenv.id());
    }

    #[test]
    fn reimport_updates_slots() {
        let store = store_with_categories();
        let today = date(2024, 10, 7);
        let first = sheet(&["Desenv,Thu 03,08:00,09:30,01:30,Draft,T1,a,b,1,1,1,1,1"]);
        let second = sheet(&["Desenv,Thu 03,08:00,09:30,01:30,Final,T1,a,b,1,1,1,1,1"]);

        for file in [&first, &second] {
            let config = task_importer(store.clone(), today).unwrap();
            Importer::new(config, CsvAdapter::new(), store.clone(), file.path())
                .parse()
                .unwrap();
        }

        let tasks = store.find(&task_schema(), &RecordFilter::new()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].get("description"), Some(&FieldValue::from("Final")));
    }

    #[test]
    fn bad_rows_are_logged_not_fatal() {
        let store = store_with_categories();
        let file = sheet(&[
            "Unknown,Thu 03,08:00,09:30,01:30,No category,T1,a,b,0,0,0,0,0",
            "Suporte,Thu 03,soon,09:30,01:30,Bad time,T1,a,b,0,0,0,0,0",
            "Suporte,Fri 04,11:00,12:00,01:00,Fine,T1,a,b,0,0,0,0,0",
        ]);
        let config = task_importer(store.clone(), date(2024, 10, 7)).unwrap();
        let mut importer = Importer::new(config, CsvAdapter::new(), store.clone(), file.path());

        let summary = importer.parse().unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(summary.failed, 2);

        let errors = importer.errors();
        assert_eq!(errors[0].index, 1);
        assert!(errors[0].trace.contains("'category' is required"));
        assert_eq!(
            errors[1].data.get("description"),
            Some(&FieldValue::from("Bad time"))
        );
        assert!(errors[1].trace.contains("expects time, got text"));
    }

    #[test]
    fn malformed_date_aborts_import() {
        let store = store_with_categories();
        let file = sheet(&["Desenv,03/10,08:00,09:30,01:30,x,T1,a,b,0,0,0,0,0"]);
        let config = task_importer(store.clone(), date(2024, 10, 7)).unwrap();
        let mut importer = Importer::new(config, CsvAdapter::new(), store.clone(), file.path());

        assert!(importer.parse().is_err());
        assert_eq!(store.count(TASK_MODEL).unwrap(), 0);
    }
}
