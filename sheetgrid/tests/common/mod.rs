//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for sheetgrid integration tests.

use engine::{CellValue, ColumnSchema, ColumnType, Record, RowId};
use sheetgrid::{CellAddress, GridController};

/// Test harness wrapping a controller with convenience accessors.
pub struct TestHarness {
    pub grid: GridController,
}

#[allow(dead_code)]
impl TestHarness {
    /// Create a harness with an empty controller.
    pub fn new() -> Self {
        TestHarness {
            grid: GridController::new(),
        }
    }

    /// Create a harness with the employee sample schema and data.
    pub fn with_sample_data() -> Self {
        let mut harness = Self::new();
        harness
            .grid
            .set_schema(EmployeeFixture::schema())
            .expect("sample schema is valid");
        harness.grid.set_data(EmployeeFixture::records());
        harness
    }

    /// Row id at a visible index.
    pub fn row_id(&self, row_index: usize) -> RowId {
        self.grid.visible_rows().order[row_index]
    }

    /// Set a cell by visible row index + column key.
    pub fn set_cell(&mut self, row_index: usize, col_key: &str, value: CellValue) {
        self.grid
            .set_cell_value(&CellAddress::row_index_col_key(row_index, col_key), value)
            .expect("cell write accepted");
    }

    /// Resolved display text of a cell.
    pub fn display(&mut self, row_index: usize, col_key: &str) -> String {
        let table = self.grid.get_table_data();
        let col_index = self.col_index(col_key);
        table[row_index][col_index].clone()
    }

    /// Visible column index for a key.
    pub fn col_index(&self, col_key: &str) -> usize {
        self.grid
            .schema()
            .index_of(col_key)
            .expect("column exists")
    }

    /// Raw (committed) value of a cell.
    pub fn raw(&self, row_index: usize, col_key: &str) -> CellValue {
        let row_id = self.row_id(row_index);
        self.grid
            .get_all_rows()
            .iter()
            .find(|r| r.id == row_id)
            .and_then(|r| r.record.get(col_key))
            .cloned()
            .unwrap_or(CellValue::Null)
    }

    /// Version of a row by visible index.
    pub fn version(&self, row_index: usize) -> u64 {
        let row_id = self.row_id(row_index);
        self.grid
            .get_all_rows()
            .iter()
            .find(|r| r.id == row_id)
            .map(|r| r.version)
            .unwrap_or(0)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TEST DATA FIXTURES
// ============================================================================

/// Build a record from key/value pairs.
pub fn record(pairs: &[(&str, CellValue)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Sample employee data for testing.
pub struct EmployeeFixture;

#[allow(dead_code)]
impl EmployeeFixture {
    pub fn schema() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::new("name", ColumnType::String).with_header("Name"),
            ColumnSchema::new("age", ColumnType::Number).with_header("Age"),
            ColumnSchema::new("city", ColumnType::String).with_header("City"),
            ColumnSchema::new("salary", ColumnType::Number).with_header("Salary"),
            ColumnSchema::new("active", ColumnType::Boolean).with_header("Active"),
        ]
    }

    pub fn records() -> Vec<Record> {
        Self::data()
            .into_iter()
            .map(|(name, age, city, salary, active)| {
                record(&[
                    ("name", name.into()),
                    ("age", age.into()),
                    ("city", city.into()),
                    ("salary", salary.into()),
                    ("active", active.into()),
                ])
            })
            .collect()
    }

    pub fn data() -> Vec<(&'static str, f64, &'static str, f64, bool)> {
        vec![
            ("Alice", 30.0, "New York", 75000.0, true),
            ("Bob", 25.0, "Los Angeles", 65000.0, true),
            ("Charlie", 35.0, "Chicago", 85000.0, false),
            ("Diana", 28.0, "Houston", 70000.0, true),
            ("Eve", 32.0, "Phoenix", 80000.0, true),
        ]
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

/// Assert that a cell displays the expected text.
#[allow(dead_code)]
pub fn assert_display(harness: &mut TestHarness, row: usize, col_key: &str, expected: &str) {
    let display = harness.display(row, col_key);
    assert_eq!(
        display, expected,
        "Cell ({}, {}) display expected '{}' but got '{}'",
        row, col_key, expected, display
    );
}

/// Assert a raw committed value.
#[allow(dead_code)]
pub fn assert_raw(harness: &TestHarness, row: usize, col_key: &str, expected: &CellValue) {
    let raw = harness.raw(row, col_key);
    assert_eq!(
        &raw, expected,
        "Cell ({}, {}) raw expected {:?} but got {:?}",
        row, col_key, expected, raw
    );
}
