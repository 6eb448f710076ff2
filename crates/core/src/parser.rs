//! Tabular parser: uploaded file bytes to header-keyed source rows.
//!
//! CSV files are read as UTF-8 delimited text; `.xls` / `.xlsx` workbooks are
//! read from their first sheet only. Header text is preserved verbatim for
//! display and for the mapping engine.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::CoreError;

// ── Constants ────────────────────────────────────────────────────────

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Extensions accepted by the upload guard.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xls", "xlsx"];

/// Message used when a file yields no data rows.
pub const NO_DATA_MESSAGE: &str = "Nenhum dado encontrado no arquivo";

/// Message used when no usable header row exists.
pub const NO_HEADER_MESSAGE: &str = "Não foi possível identificar o cabeçalho do arquivo";

/// Delimiters considered when sniffing a CSV header line.
const CSV_DELIMITERS: &[u8] = b",;\t";

// ── Types ────────────────────────────────────────────────────────────

/// Declared kind of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Csv,
    Spreadsheet,
}

impl FileKind {
    /// Derive the kind from a file name's extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = file_name.rsplit_once('.')?.1.to_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xls" | "xlsx" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// One data row of the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRow {
    /// Zero-based position among the data rows (header excluded).
    pub index: usize,
    /// Raw header -> raw cell value, in column order.
    pub values: IndexMap<String, String>,
}

impl SourceRow {
    /// Raw value under `header`, if the column exists.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.values.get(header).map(String::as_str)
    }
}

/// The parsed contents of one uploaded file.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedSheet {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
}

// ── Upload guard ─────────────────────────────────────────────────────

/// Check the extension and size constraints of an upload before parsing.
pub fn validate_upload(file_name: &str, size_bytes: usize) -> Result<FileKind, CoreError> {
    let kind = FileKind::from_file_name(file_name).ok_or_else(|| {
        CoreError::Parse(format!(
            "Formato de arquivo não suportado. Use: {}",
            SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;
    if size_bytes > MAX_UPLOAD_BYTES {
        return Err(CoreError::Parse(format!(
            "Arquivo excede o tamanho máximo de {} MB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(kind)
}

// ── Parsing ──────────────────────────────────────────────────────────

/// Parse an upload on the blocking pool, resuming the caller once with
/// the whole sheet.
pub async fn parse_upload(bytes: Vec<u8>, kind: FileKind) -> Result<ParsedSheet, CoreError> {
    tokio::task::spawn_blocking(move || parse_bytes(&bytes, kind))
        .await
        .map_err(|e| CoreError::Internal(format!("Parser task failed: {e}")))?
}

/// Parse file bytes of the given kind into header-keyed rows.
pub fn parse_bytes(bytes: &[u8], kind: FileKind) -> Result<ParsedSheet, CoreError> {
    let grid = match kind {
        FileKind::Csv => read_csv_grid(bytes)?,
        FileKind::Spreadsheet => read_workbook_grid(bytes)?,
    };
    build_sheet(grid)
}

/// Turn a raw cell grid (first line = header) into a [`ParsedSheet`].
fn build_sheet(grid: Vec<Vec<String>>) -> Result<ParsedSheet, CoreError> {
    let mut lines = grid.into_iter();
    let header_cells = lines
        .next()
        .ok_or_else(|| CoreError::Parse(NO_DATA_MESSAGE.to_string()))?;

    // (column position, unique header key)
    let columns = header_columns(&header_cells);
    if columns.is_empty() {
        return Err(CoreError::Parse(NO_HEADER_MESSAGE.to_string()));
    }

    let mut rows = Vec::new();
    for cells in lines {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let values = columns
            .iter()
            .map(|(pos, header)| {
                let value = cells.get(*pos).cloned().unwrap_or_default();
                (header.clone(), value)
            })
            .collect();
        rows.push(SourceRow {
            index: rows.len(),
            values,
        });
    }

    if rows.is_empty() {
        return Err(CoreError::Parse(NO_DATA_MESSAGE.to_string()));
    }

    Ok(ParsedSheet {
        headers: columns.into_iter().map(|(_, h)| h).collect(),
        rows,
    })
}

/// Resolve header cells to unique keys, skipping blank headers.
///
/// Repeated header text gets a `_1`, `_2`, ... suffix on later occurrences.
fn header_columns(cells: &[String]) -> Vec<(usize, String)> {
    let mut columns: Vec<(usize, String)> = Vec::new();
    for (pos, cell) in cells.iter().enumerate() {
        if cell.trim().is_empty() {
            continue;
        }
        let raw = cell.as_str();
        let mut key = raw.to_string();
        let mut suffix = 1;
        while columns.iter().any(|(_, existing)| *existing == key) {
            key = format!("{raw}_{suffix}");
            suffix += 1;
        }
        columns.push((pos, key));
    }
    columns
}

fn read_csv_grid(bytes: &[u8]) -> Result<Vec<Vec<String>>, CoreError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| CoreError::Parse("Arquivo CSV não está em UTF-8".to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(text))
        .from_reader(text.as_bytes());

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect())
                .map_err(|e| CoreError::Parse(format!("CSV inválido: {e}")))
        })
        .collect()
}

/// Pick the delimiter that occurs most often on the first line.
fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or_default();
    CSV_DELIMITERS
        .iter()
        .copied()
        .map(|d| (d, first_line.bytes().filter(|b| *b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

fn read_workbook_grid(bytes: &[u8]) -> Result<Vec<Vec<String>>, CoreError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| CoreError::Parse(format!("Planilha inválida: {e}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CoreError::Parse(NO_DATA_MESSAGE.to_string()))?
        .map_err(|e| CoreError::Parse(format!("Planilha inválida: {e}")))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn csv(text: &str) -> Result<ParsedSheet, CoreError> {
        parse_bytes(text.as_bytes(), FileKind::Csv)
    }

    #[test]
    fn kind_from_extension() {
        assert_eq!(FileKind::from_file_name("contatos.csv"), Some(FileKind::Csv));
        assert_eq!(
            FileKind::from_file_name("Contatos.XLSX"),
            Some(FileKind::Spreadsheet)
        );
        assert_eq!(
            FileKind::from_file_name("old.xls"),
            Some(FileKind::Spreadsheet)
        );
        assert_eq!(FileKind::from_file_name("notes.txt"), None);
        assert_eq!(FileKind::from_file_name("noext"), None);
    }

    #[test]
    fn upload_guard_rejects_large_and_unknown_files() {
        assert_matches!(validate_upload("a.csv", 10), Ok(FileKind::Csv));
        assert_matches!(validate_upload("a.pdf", 10), Err(CoreError::Parse(_)));
        assert_matches!(
            validate_upload("a.xlsx", MAX_UPLOAD_BYTES + 1),
            Err(CoreError::Parse(_))
        );
        assert_matches!(
            validate_upload("a.xlsx", MAX_UPLOAD_BYTES),
            Ok(FileKind::Spreadsheet)
        );
    }

    #[test]
    fn parses_comma_separated_file() {
        let sheet = csv("Nome,Email\nAna Silva,ana@x.com\nBruno,bruno@y.com\n").unwrap();
        assert_eq!(sheet.headers, vec!["Nome", "Email"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].index, 0);
        assert_eq!(sheet.rows[0].get("Nome"), Some("Ana Silva"));
        assert_eq!(sheet.rows[1].get("Email"), Some("bruno@y.com"));
    }

    #[test]
    fn sniffs_semicolon_delimiter() {
        let sheet = csv("Nome;Empresa;CNPJ\nAna;\"ACME, LTDA\";12.345.678/0001-99\n").unwrap();
        assert_eq!(sheet.headers, vec!["Nome", "Empresa", "CNPJ"]);
        assert_eq!(sheet.rows[0].get("Empresa"), Some("ACME, LTDA"));
    }

    #[test]
    fn strips_bom_and_keeps_raw_header_text() {
        let sheet = csv("\u{feff}Razão Social,E-mail\nACME,a@b.com\n").unwrap();
        assert_eq!(sheet.headers, vec!["Razão Social", "E-mail"]);
    }

    #[test]
    fn header_whitespace_is_not_trimmed() {
        let sheet = csv(" Nome ,Email\nAna,a@b.com\n").unwrap();
        assert_eq!(sheet.headers, vec![" Nome ", "Email"]);
        assert_eq!(sheet.rows[0].get(" Nome "), Some("Ana"));
        assert_eq!(sheet.rows[0].get("Nome"), None);
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() {
        let sheet = csv("Nome,Email,Telefone\nAna\n").unwrap();
        assert_eq!(sheet.rows[0].get("Email"), Some(""));
        assert_eq!(sheet.rows[0].get("Telefone"), Some(""));
    }

    #[test]
    fn blank_rows_are_skipped_and_indexes_stay_dense() {
        let sheet = csv("Nome\nAna\n,\n\nBruno\n").unwrap();
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[1].index, 1);
        assert_eq!(sheet.rows[1].get("Nome"), Some("Bruno"));
    }

    #[test]
    fn duplicate_headers_get_suffixes_and_blank_headers_are_dropped() {
        let sheet = csv("Nome,,Nome,Nome\nA,x,B,C\n").unwrap();
        assert_eq!(sheet.headers, vec!["Nome", "Nome_1", "Nome_2"]);
        assert_eq!(sheet.rows[0].get("Nome_1"), Some("B"));
        assert_eq!(sheet.rows[0].values.len(), 3);
    }

    #[test]
    fn header_only_file_has_no_data() {
        let err = csv("Nome,Email\n").unwrap_err();
        assert_matches!(err, CoreError::Parse(msg) if msg == NO_DATA_MESSAGE);
    }

    #[test]
    fn empty_file_has_no_data() {
        let err = csv("").unwrap_err();
        assert_matches!(err, CoreError::Parse(msg) if msg == NO_DATA_MESSAGE);
    }

    #[test]
    fn blank_header_row_is_rejected() {
        let err = csv(",,\nAna,b,c\n").unwrap_err();
        assert_matches!(err, CoreError::Parse(msg) if msg == NO_HEADER_MESSAGE);
    }

    #[test]
    fn invalid_utf8_is_a_parse_error() {
        let err = parse_bytes(&[0x4e, 0x6f, 0xff, 0xfe, b'\n'], FileKind::Csv).unwrap_err();
        assert_matches!(err, CoreError::Parse(_));
    }

    #[test]
    fn garbage_workbook_is_a_parse_error() {
        let err = parse_bytes(b"definitely not a workbook", FileKind::Spreadsheet).unwrap_err();
        assert_matches!(err, CoreError::Parse(_));
    }

    // ── Workbooks ──

    /// Inline-string cell.
    fn text_cell(r: &str, value: &str) -> String {
        format!(r#"<c r="{r}" t="inlineStr"><is><t>{value}</t></is></c>"#)
    }

    /// Numeric cell.
    fn number_cell(r: &str, value: &str) -> String {
        format!(r#"<c r="{r}"><v>{value}</v></c>"#)
    }

    fn sheet_row(n: usize, cells: &[String]) -> String {
        format!(r#"<row r="{n}">{}</row>"#, cells.concat())
    }

    /// Minimal `.xlsx` with one worksheet per entry of `sheets`, each given
    /// as its `<sheetData>` rows.
    fn xlsx(sheets: &[(&str, Vec<String>)]) -> Vec<u8> {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
        const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
        const PKG_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

        let mut overrides = String::new();
        let mut sheet_entries = String::new();
        let mut relationships = String::new();
        for (i, (name, _)) in sheets.iter().enumerate() {
            let n = i + 1;
            overrides.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
            sheet_entries.push_str(&format!(
                r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#
            ));
            relationships.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="{REL_NS}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));
        }

        let mut files: Vec<(String, String)> = vec![
            (
                "[Content_Types].xml".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
                ),
            ),
            (
                "_rels/.rels".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_NS}"><Relationship Id="rId1" Type="{REL_NS}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
                ),
            ),
            (
                "xl/workbook.xml".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets>{sheet_entries}</sheets></workbook>"#
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels".to_string(),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{PKG_NS}">{relationships}</Relationships>"#
                ),
            ),
        ];
        for (i, (_, rows)) in sheets.iter().enumerate() {
            files.push((
                format!("xl/worksheets/sheet{}.xml", i + 1),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="{MAIN_NS}"><sheetData>{}</sheetData></worksheet>"#,
                    rows.concat()
                ),
            ));
        }

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (path, body) in files {
            writer.start_file(path, SimpleFileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_first_sheet_of_workbook() {
        let contatos = vec![
            sheet_row(
                1,
                &[
                    text_cell("A1", "Nome"),
                    text_cell("B1", "CPF"),
                    text_cell("C1", "CNPJ"),
                    text_cell("D1", "Automotores"),
                ],
            ),
            sheet_row(
                2,
                &[
                    text_cell("A2", "Ana Silva"),
                    number_cell("B2", "12345678909"),
                    number_cell("C2", "12345678000199"),
                    number_cell("D2", "12"),
                ],
            ),
            sheet_row(3, &[text_cell("A3", "Bruno"), text_cell("B3", "123.456.789-09")]),
        ];
        let resumo = vec![
            sheet_row(1, &[text_cell("A1", "Total")]),
            sheet_row(2, &[number_cell("A2", "2")]),
        ];
        let bytes = xlsx(&[("Contatos", contatos), ("Resumo", resumo)]);

        let sheet = parse_bytes(&bytes, FileKind::Spreadsheet).unwrap();
        assert_eq!(sheet.headers, vec!["Nome", "CPF", "CNPJ", "Automotores"]);
        assert_eq!(sheet.rows.len(), 2);

        let ana = &sheet.rows[0];
        assert_eq!(ana.get("Nome"), Some("Ana Silva"));
        assert_eq!(ana.get("CPF"), Some("12345678909"));
        assert_eq!(ana.get("CNPJ"), Some("12345678000199"));
        assert_eq!(ana.get("Automotores"), Some("12"));

        let bruno = &sheet.rows[1];
        assert_eq!(bruno.get("CPF"), Some("123.456.789-09"));
        assert_eq!(bruno.get("CNPJ"), Some(""));
        assert!(sheet.rows.iter().all(|r| r.get("Total").is_none()));
    }

    #[test]
    fn workbook_with_header_only_has_no_data() {
        let bytes = xlsx(&[("Contatos", vec![sheet_row(1, &[text_cell("A1", "Nome")])])]);
        let err = parse_bytes(&bytes, FileKind::Spreadsheet).unwrap_err();
        assert_matches!(err, CoreError::Parse(msg) if msg == NO_DATA_MESSAGE);
    }

    #[test]
    fn integral_floats_render_without_fraction() {
        assert_eq!(cell_text(&Data::Float(12345678909.0)), "12345678909");
        assert_eq!(cell_text(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("x".into())), "x");
    }

    #[tokio::test]
    async fn parse_upload_runs_off_the_async_thread() {
        let sheet = parse_upload(b"Nome\nAna\n".to_vec(), FileKind::Csv)
            .await
            .unwrap();
        assert_eq!(sheet.rows.len(), 1);
    }
}
