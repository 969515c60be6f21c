// src/services/parser.rs

//! Record parser service.
//!
//! Turns the delimited registry export into target-category records. Header
//! aliases are resolved once per feed into a column table used for every row.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{FieldAliases, ParserConfig, Record};

/// Delimiters considered by detection, in tie-break order.
const DELIMITERS: [char; 3] = [',', ';', '\t'];

/// Counters describing one parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Data rows seen (header and blank lines excluded)
    pub rows: usize,
    /// Rows with too few fields
    pub malformed: usize,
    /// Rows outside the target category
    pub off_category: usize,
    /// Target rows without certificate number or name
    pub missing_fields: usize,
    /// Target rows repeating an earlier id
    pub duplicates: usize,
    /// Records returned
    pub retained: usize,
}

/// Records plus the counters that produced them.
#[derive(Debug, Clone)]
pub struct ParseOutput {
    pub records: Vec<Record>,
    pub stats: ParseStats,
}

/// Decides whether a device-type label belongs to the target category.
#[derive(Debug, Clone)]
pub struct CategoryMatcher {
    labels: Vec<String>,
    keywords: Vec<String>,
}

impl CategoryMatcher {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            labels: config
                .category_labels
                .iter()
                .map(|l| l.trim().to_string())
                .collect(),
            keywords: config
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Exact label match, or case-insensitive keyword substring match.
    pub fn matches(&self, device_type: &str) -> bool {
        let device_type = device_type.trim();
        if device_type.is_empty() {
            return false;
        }
        if self.labels.iter().any(|l| l == device_type) {
            return true;
        }
        let lowered = device_type.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Logical record fields resolved from headers.
#[derive(Debug, Clone, Copy)]
enum Field {
    CertificateNumber,
    TradeName,
    ModelCode,
    DeviceType,
    CompanyName,
}

impl Field {
    const ALL: [Field; 5] = [
        Field::CertificateNumber,
        Field::TradeName,
        Field::ModelCode,
        Field::DeviceType,
        Field::CompanyName,
    ];

    fn aliases(self, aliases: &FieldAliases) -> &[String] {
        match self {
            Field::CertificateNumber => &aliases.certificate_number,
            Field::TradeName => &aliases.trade_name,
            Field::ModelCode => &aliases.model_code,
            Field::DeviceType => &aliases.device_type,
            Field::CompanyName => &aliases.company_name,
        }
    }
}

/// Column indices per logical field, in alias priority order.
#[derive(Debug, Clone)]
struct ColumnMap {
    columns: [Vec<usize>; 5],
}

impl ColumnMap {
    fn build(headers: &[String], aliases: &FieldAliases) -> Self {
        let columns = Field::ALL.map(|field| {
            let mut indices = Vec::new();
            for alias in field.aliases(aliases) {
                let alias = normalize_header(alias);
                for (idx, header) in headers.iter().enumerate() {
                    if *header == alias && !indices.contains(&idx) {
                        indices.push(idx);
                    }
                }
            }
            indices
        });
        Self { columns }
    }

    fn has(&self, field: Field) -> bool {
        !self.columns[field as usize].is_empty()
    }

    /// First non-empty value among the candidate columns.
    fn value<'a>(&self, field: Field, row: &'a [String]) -> &'a str {
        self.columns[field as usize]
            .iter()
            .filter_map(|&idx| row.get(idx))
            .map(|v| v.as_str())
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }
}

/// Parser for the registry CSV export.
#[derive(Debug, Clone)]
pub struct RecordParser {
    matcher: CategoryMatcher,
    aliases: FieldAliases,
    min_fields: usize,
}

impl RecordParser {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            matcher: CategoryMatcher::new(config),
            aliases: config.aliases.clone(),
            min_fields: config.min_fields,
        }
    }

    /// Parse raw feed text into target-category records in source order.
    pub fn parse(&self, text: &str, discovered_at: DateTime<Utc>) -> Result<ParseOutput> {
        let text = text.trim_start_matches('\u{feff}');
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header_line = lines
            .next()
            .ok_or_else(|| AppError::parse("feed is empty"))?;
        let mut data_lines = lines.peekable();
        if data_lines.peek().is_none() {
            return Err(AppError::parse("feed has a header but no data rows"));
        }

        let delimiter = detect_delimiter(header_line);
        let headers: Vec<String> = split_line(header_line, delimiter)
            .iter()
            .map(|h| normalize_header(h))
            .collect();
        let columns = ColumnMap::build(&headers, &self.aliases);
        if !columns.has(Field::CertificateNumber) {
            return Err(AppError::parse(format!(
                "no certificate number column among headers: {}",
                headers.join(" | ")
            )));
        }
        log::debug!(
            "Detected delimiter {:?} with {} header column(s)",
            delimiter,
            headers.len()
        );

        let mut stats = ParseStats::default();
        let mut seen = HashSet::new();
        let mut records = Vec::new();

        for (line_no, line) in data_lines.enumerate() {
            stats.rows += 1;
            let row = split_line(line, delimiter);
            if row.len() < self.min_fields {
                stats.malformed += 1;
                log::warn!(
                    "Skipping malformed row {} ({} field(s)): {}",
                    line_no + 2,
                    row.len(),
                    line.trim()
                );
                continue;
            }

            let device_type = columns.value(Field::DeviceType, &row);
            if !self.matcher.matches(device_type) {
                stats.off_category += 1;
                continue;
            }

            let certificate_number = columns.value(Field::CertificateNumber, &row);
            let trade_name = columns.value(Field::TradeName, &row);
            let model_code = columns.value(Field::ModelCode, &row);
            if certificate_number.is_empty() || (trade_name.is_empty() && model_code.is_empty()) {
                stats.missing_fields += 1;
                continue;
            }

            if !seen.insert(certificate_number.to_string()) {
                stats.duplicates += 1;
                log::debug!("Duplicate certificate {} skipped", certificate_number);
                continue;
            }

            records.push(Record {
                id: certificate_number.to_string(),
                certificate_number: certificate_number.to_string(),
                trade_name: trade_name.to_string(),
                model_code: model_code.to_string(),
                device_type: device_type.to_string(),
                company_name: columns.value(Field::CompanyName, &row).to_string(),
                discovered_at,
            });
        }

        stats.retained = records.len();
        Ok(ParseOutput { records, stats })
    }
}

/// Pick the delimiter that splits the header line into the most fields.
pub fn detect_delimiter(line: &str) -> char {
    let mut best = ',';
    let mut best_count = 0;
    for delimiter in DELIMITERS {
        let count = split_line(line, delimiter).len();
        if count > best_count {
            best = delimiter;
            best_count = count;
        }
    }
    if best_count > 1 { best } else { ',' }
}

/// Split on the delimiter outside double quotes, dropping quote characters.
///
/// A quote opens a quoted section only at the start of a field; elsewhere it
/// is a literal (an inch mark, say) and is dropped. A line whose quoted
/// section never closes is split on every delimiter instead.
fn split_line(line: &str, delimiter: char) -> Vec<String> {
    split_quoted(line, delimiter).unwrap_or_else(|| {
        line.split(delimiter)
            .map(|field| field.replace('"', "").trim().to_string())
            .collect()
    })
}

fn split_quoted(line: &str, delimiter: char) -> Option<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' if in_quotes => in_quotes = false,
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            '"' => {}
            c if c == delimiter && !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return None;
    }
    fields.push(current.trim().to_string());
    Some(fields)
}

/// Trim, case-fold and unquote a header token.
fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 6, 0, 0).unwrap()
    }

    fn parser() -> RecordParser {
        RecordParser::new(&ParserConfig::default())
    }

    const FEED: &str = "\
Certificate_No,Trade_Name,Model,Device_Type,Company
B001,Galaxy,SM-S931B,Cellular Mobile (GSM/WCDMA/LTE/NR),Thai Samsung Electronics
B002,Radio One,RX-9,Broadcasting Equipment,Radio Corp
B003,iPhone,A3090,\"Smartphone, LTE\",\"Apple South Asia (Thailand) Co., Ltd.\"
";

    #[test]
    fn test_inch_mark_inside_field_keeps_row() {
        let feed = "\
certificate_no,trade_name,model,device_type,company
B100,Galaxy Tab 11\" ,SM-X820,Cellular Mobile (GSM/WCDMA/LTE/NR),Thai Samsung
B101,Galaxy A56,SM-A566B,Cellular Mobile (GSM/WCDMA/LTE/NR),Thai Samsung
";
        let out = parser().parse(feed, now()).unwrap();
        let ids: Vec<_> = out.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["B100", "B101"]);
        assert_eq!(out.records[0].trade_name, "Galaxy Tab 11");
        assert_eq!(out.records[0].model_code, "SM-X820");
        assert_eq!(out.stats.malformed, 0);
    }

    #[test]
    fn test_unclosed_leading_quote_falls_back_to_plain_split() {
        assert_eq!(
            split_line("B200,\"12 inch,SM-1,LTE", ','),
            vec!["B200", "12 inch", "SM-1", "LTE"]
        );
        assert_eq!(split_line("\"a,b\",c", ','), vec!["a,b", "c"]);
    }

    #[test]
    fn test_parses_target_rows_in_order() {
        let out = parser().parse(FEED, now()).unwrap();
        let ids: Vec<_> = out.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["B001", "B003"]);

        let iphone = &out.records[1];
        assert_eq!(iphone.trade_name, "iPhone");
        assert_eq!(iphone.model_code, "A3090");
        assert_eq!(iphone.device_type, "Smartphone, LTE");
        assert_eq!(iphone.company_name, "Apple South Asia (Thailand) Co., Ltd.");
        assert_eq!(iphone.discovered_at, now());

        assert_eq!(out.stats.rows, 3);
        assert_eq!(out.stats.off_category, 1);
        assert_eq!(out.stats.retained, 2);
    }

    #[test]
    fn test_broadcasting_equipment_never_included() {
        let feed = "certificate_no,brand,model,type,company\n\
            X1,Mobile Radio,Cellular LTE,Broadcasting Equipment,GSM Ltd\n";
        let out = parser().parse(feed, now()).unwrap();
        assert!(out.records.is_empty());
    }

    #[test]
    fn test_category_matching() {
        let matcher = CategoryMatcher::new(&ParserConfig::default());
        assert!(matcher.matches("Cellular Mobile (GSM/WCDMA/LTE/NR)"));
        assert!(matcher.matches("FDD-LTE Terminal"));
        assert!(matcher.matches("lte module"));
        assert!(matcher.matches("5G Router"));
        assert!(!matcher.matches("Broadcasting Equipment"));
        assert!(!matcher.matches(""));
    }

    #[test]
    fn test_exact_label_without_keywords() {
        let config = ParserConfig {
            keywords: vec![],
            ..ParserConfig::default()
        };
        let matcher = CategoryMatcher::new(&config);
        assert!(matcher.matches(" Cellular Mobile (GSM/WCDMA/LTE/NR) "));
        assert!(!matcher.matches("cellular mobile (gsm/wcdma/lte/nr)"));
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        let with_bad = "\
certificate_no,trade_name,model,device_type,company
B001,Galaxy,S1,Cellular Mobile (GSM/WCDMA/LTE/NR),Samsung
garbage;row
B002,Galaxy,S2,Cellular Mobile (GSM/WCDMA/LTE/NR),Samsung
";
        let without_bad = "\
certificate_no,trade_name,model,device_type,company
B001,Galaxy,S1,Cellular Mobile (GSM/WCDMA/LTE/NR),Samsung
B002,Galaxy,S2,Cellular Mobile (GSM/WCDMA/LTE/NR),Samsung
";
        let a = parser().parse(with_bad, now()).unwrap();
        let b = parser().parse(without_bad, now()).unwrap();
        assert_eq!(a.records, b.records);
        assert_eq!(a.stats.malformed, 1);
    }

    #[test]
    fn test_comma_and_semicolon_feeds_are_equivalent() {
        let comma = "cert_no,brand,model,device_type,company\n\
            C1,Nokia,TA-1600,GSM Phone,HMD Global\n\
            C2,Oppo,CPH2665,5G Smartphone,Oppo Thailand\n";
        let semicolon = "cert_no;brand;model;device_type;company\n\
            C1;Nokia;TA-1600;GSM Phone;HMD Global\n\
            C2;Oppo;CPH2665;5G Smartphone;Oppo Thailand\n";
        let a = parser().parse(comma, now()).unwrap();
        let b = parser().parse(semicolon, now()).unwrap();
        assert_eq!(a.records.len(), 2);
        assert_eq!(a.records, b.records);
    }

    #[test]
    fn test_tab_delimited_with_crlf_and_bom() {
        let feed = "\u{feff}\"Certificate Number\"\t\"Trade Name\"\tModel\tType\r\n\
            T1\tVivo\tV2405\tLTE Phone\r\n";
        let out = parser().parse(feed, now()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].trade_name, "Vivo");
        assert_eq!(out.records[0].company_name, "");
    }

    #[test]
    fn test_aliases_take_first_non_empty_value() {
        // Both "certificate_no" and "cert_no" columns exist; the first is blank on row 2.
        let feed = "certificate_no,cert_no,brand,model,type\n\
            A1,Z9,Xiaomi,2409,LTE Phone\n\
            ,Z8,Xiaomi,2410,LTE Phone\n";
        let out = parser().parse(feed, now()).unwrap();
        let ids: Vec<_> = out.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "Z8"]);
    }

    #[test]
    fn test_rows_without_id_or_name_are_dropped() {
        let feed = "certificate_no,brand,model,type\n\
            ,Xiaomi,2409,LTE Phone\n\
            D2,,,LTE Phone\n\
            D3,,2411,LTE Phone\n";
        let out = parser().parse(feed, now()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, "D3");
        assert_eq!(out.stats.missing_fields, 2);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let feed = "certificate_no,brand,model,type\n\
            E1,Honor,A,LTE Phone\n\
            E1,Honor,B,LTE Phone\n";
        let out = parser().parse(feed, now()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].model_code, "A");
        assert_eq!(out.stats.duplicates, 1);
    }

    #[test]
    fn test_single_line_feed_is_parse_error() {
        assert!(matches!(
            parser().parse("certificate_no,brand,model\n", now()),
            Err(AppError::Parse(_))
        ));
        assert!(matches!(parser().parse("\n\n", now()), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_missing_id_column_is_parse_error() {
        let feed = "name,brand,model\nfoo,bar,baz\n";
        assert!(matches!(parser().parse(feed, now()), Err(AppError::Parse(_))));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a;b;c"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("\"a;b\",c"), ',');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_parse_is_restartable() {
        let p = parser();
        let first = p.parse(FEED, now()).unwrap();
        let second = p.parse(FEED, now()).unwrap();
        assert_eq!(first.records, second.records);
        assert_eq!(first.stats, second.stats);
    }
}
