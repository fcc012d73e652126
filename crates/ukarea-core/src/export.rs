//! CSV and spreadsheet rendering for search results.
//!
//! CSV output is a plain comma join with no quoting, so a field containing a
//! comma shifts the columns of its row. The "XLS" format is an HTML table in
//! a minimal document, which spreadsheet applications open when it is served
//! with the Excel MIME type.

use chrono::NaiveDate;

use crate::{CityRecord, CoreError};

const POSTCODE_HEADER: &str = "Postcode";
const CITY_HEADERS: [&str; 5] = ["City", "Population", "Area Code", "Latitude", "Longitude"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Xls,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xls => "xls",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv;charset=utf-8",
            ExportFormat::Xls => "application/vnd.ms-excel",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xls" | "excel" => Ok(Self::Xls),
            other => Err(CoreError::UnknownExportFormat(other.to_string())),
        }
    }
}

/// `uk_postcodes_2024-05-01.csv` style download name.
#[must_use]
pub fn file_name(subject: &str, format: ExportFormat, date: NaiveDate) -> String {
    format!(
        "uk_{subject}_{}.{}",
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

#[must_use]
pub fn render_postcodes(format: ExportFormat, outward_codes: &[String]) -> String {
    match format {
        ExportFormat::Csv => postcodes_csv(outward_codes),
        ExportFormat::Xls => html_table(
            &[POSTCODE_HEADER],
            outward_codes.iter().map(|code| vec![code.clone()]),
        ),
    }
}

#[must_use]
pub fn render_cities(format: ExportFormat, cities: &[CityRecord]) -> String {
    match format {
        ExportFormat::Csv => cities_csv(cities),
        ExportFormat::Xls => html_table(&CITY_HEADERS, cities.iter().map(city_fields)),
    }
}

#[must_use]
pub fn postcodes_csv(outward_codes: &[String]) -> String {
    std::iter::once(POSTCODE_HEADER.to_string())
        .chain(outward_codes.iter().cloned())
        .collect::<Vec<_>>()
        .join("\n")
}

#[must_use]
pub fn cities_csv(cities: &[CityRecord]) -> String {
    std::iter::once(CITY_HEADERS.join(","))
        .chain(cities.iter().map(|city| city_fields(city).join(",")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn city_fields(city: &CityRecord) -> Vec<String> {
    let (lat, lng) = city.coordinates.map_or_else(
        || (String::new(), String::new()),
        |p| (p.latitude.to_string(), p.longitude.to_string()),
    );
    vec![
        city.name.clone(),
        city.population.to_string(),
        city.area_code.clone(),
        lat,
        lng,
    ]
}

fn html_table<I>(headers: &[&str], rows: I) -> String
where
    I: IntoIterator<Item = Vec<String>>,
{
    let header_cells: String = headers
        .iter()
        .map(|h| format!("<th>{}</th>", escape_html(h)))
        .collect();
    let body: String = rows
        .into_iter()
        .map(|row| {
            let cells: String = row
                .iter()
                .map(|cell| format!("<td>{}</td>", escape_html(cell)))
                .collect();
            format!("<tr>{cells}</tr>")
        })
        .collect();

    format!(
        "<html>\n<head>\n<meta charset=\"UTF-8\">\n</head>\n<body>\n<table>\n<tr>{header_cells}</tr>\n{body}\n</table>\n</body>\n</html>\n"
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
