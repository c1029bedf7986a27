//! Fixed somatometria record layout and the header-to-field mapper.
//!
//! The mapper resolves every target field through [`FIELD_DICTIONARY`]: for a
//! target, the first original header whose normalized name loosely matches one
//! of the target's aliases supplies the value, which is then coerced by the
//! target's [`Coercion`]. Targets without a matching header are left out of the
//! mapped row and stored as null.

use serde::{Deserialize, Serialize};

use crate::data::{Value, non_empty_text, parse_integer, parse_measurement};
use crate::naming::{loosely_matches, normalize_column_name};

/// Logical table-name tag assigned to uploads stored as somatometria records.
pub const SOMATOMETRIA_TABLE: &str = "somatometria";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    /// Floating point, with a comma accepted as decimal separator.
    Measurement,
    Integer,
    Text,
}

impl Coercion {
    pub fn apply(self, raw: &str) -> Option<Value> {
        match self {
            Coercion::Measurement => parse_measurement(raw).map(Value::Float),
            Coercion::Integer => parse_integer(raw).map(Value::Integer),
            Coercion::Text => non_empty_text(raw).map(Value::String),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub target: &'static str,
    pub aliases: &'static [&'static str],
    pub coercion: Coercion,
}

const fn field(
    target: &'static str,
    aliases: &'static [&'static str],
    coercion: Coercion,
) -> FieldSpec {
    FieldSpec {
        target,
        aliases,
        coercion,
    }
}

/// Target fields in resolution order, each with its accepted header aliases.
pub const FIELD_DICTIONARY: &[FieldSpec] = &[
    field("no_control", &["no_control", "control", "numero_control"], Coercion::Text),
    field("curp", &["curp"], Coercion::Text),
    field("nombre", &["nombre", "name"], Coercion::Text),
    field("paterno", &["paterno", "apellido_paterno", "ap_paterno"], Coercion::Text),
    field("materno", &["materno", "apellido_materno", "ap_materno"], Coercion::Text),
    field("grupo", &["grupo", "group"], Coercion::Text),
    field("edad", &["edad", "age"], Coercion::Integer),
    field(
        "certificacion_medica",
        &["certificacion_medica", "certificacion", "cert_medica"],
        Coercion::Text,
    ),
    field("sexo", &["sexo", "sex", "genero"], Coercion::Text),
    field("peso", &["peso", "weight"], Coercion::Measurement),
    field("perimetro", &["perimetro", "perimeter"], Coercion::Measurement),
    field("estatura", &["estatura", "altura", "height"], Coercion::Measurement),
    field("tension", &["tension"], Coercion::Text),
    field("tension_a", &["tension_a", "presion_arterial"], Coercion::Integer),
    field("presion_a", &["presion_a"], Coercion::Integer),
    field("tension_d", &["tension_d"], Coercion::Integer),
    field("frecuencia", &["frecuencia", "freq"], Coercion::Integer),
    field("temperatura", &["temperatura", "temp"], Coercion::Measurement),
    field("saturacion", &["saturacion", "sat"], Coercion::Measurement),
    field("glucometria", &["glucometria", "glucosa"], Coercion::Measurement),
    field("imc", &["imc", "bmi"], Coercion::Measurement),
    field("clasificacion", &["clasificacion", "classification"], Coercion::Text),
    field("imp", &["imp", "clasificacion_imp", "clasificacion"], Coercion::Text),
];

/// Result of mapping one row: matched targets in dictionary order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRow {
    entries: Vec<(&'static str, Option<Value>)>,
}

impl MappedRow {
    /// `None` when the target had no matching header; `Some(None)` when it
    /// matched but the value coerced to null.
    pub fn get(&self, target: &str) -> Option<Option<&Value>> {
        self.entries
            .iter()
            .find(|(name, _)| *name == target)
            .map(|(_, value)| value.as_ref())
    }

    pub fn matched_targets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn text(&self, target: &str) -> Option<String> {
        self.get(target)
            .flatten()
            .and_then(|v| v.as_str().map(str::to_string))
    }

    fn integer(&self, target: &str) -> Option<i64> {
        self.get(target).flatten().and_then(Value::as_i64)
    }

    fn float(&self, target: &str) -> Option<f64> {
        self.get(target).flatten().and_then(Value::as_f64)
    }
}

/// Resolves, for every target field, which header column feeds it.
///
/// Returns `(target index in FIELD_DICTIONARY, header index)` pairs.
pub fn resolve_columns<S: AsRef<str>>(headers: &[S]) -> Vec<(usize, usize)> {
    let normalized = headers
        .iter()
        .map(|h| normalize_column_name(h.as_ref()))
        .collect::<Vec<_>>();
    FIELD_DICTIONARY
        .iter()
        .enumerate()
        .filter_map(|(target_idx, spec)| {
            normalized
                .iter()
                .position(|header| {
                    spec.aliases
                        .iter()
                        .any(|alias| loosely_matches(header, alias))
                })
                .map(|header_idx| (target_idx, header_idx))
        })
        .collect()
}

/// Maps one raw row (values aligned with `headers`) onto the target fields.
pub fn map_row<S: AsRef<str>>(headers: &[S], row: &[String]) -> MappedRow {
    let plan = resolve_columns(headers);
    map_row_with(&plan, row)
}

/// Same as [`map_row`] but reuses a plan from [`resolve_columns`].
pub fn map_row_with(plan: &[(usize, usize)], row: &[String]) -> MappedRow {
    let entries = plan
        .iter()
        .map(|&(target_idx, header_idx)| {
            let spec = &FIELD_DICTIONARY[target_idx];
            let raw = row.get(header_idx).map(String::as_str).unwrap_or("");
            (spec.target, spec.coercion.apply(raw))
        })
        .collect();
    MappedRow { entries }
}

/// Typed somatometria fields; unmatched or unparseable fields are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SomatometriaFields {
    pub no_control: Option<String>,
    pub curp: Option<String>,
    pub nombre: Option<String>,
    pub paterno: Option<String>,
    pub materno: Option<String>,
    pub grupo: Option<String>,
    pub edad: Option<i64>,
    pub certificacion_medica: Option<String>,
    pub sexo: Option<String>,
    pub peso: Option<f64>,
    pub perimetro: Option<f64>,
    pub estatura: Option<f64>,
    pub tension: Option<String>,
    pub tension_a: Option<i64>,
    pub presion_a: Option<i64>,
    pub tension_d: Option<i64>,
    pub frecuencia: Option<i64>,
    pub temperatura: Option<f64>,
    pub saturacion: Option<f64>,
    pub glucometria: Option<f64>,
    pub imc: Option<f64>,
    pub clasificacion: Option<String>,
    pub imp: Option<String>,
}

impl From<&MappedRow> for SomatometriaFields {
    fn from(row: &MappedRow) -> Self {
        Self {
            no_control: row.text("no_control"),
            curp: row.text("curp"),
            nombre: row.text("nombre"),
            paterno: row.text("paterno"),
            materno: row.text("materno"),
            grupo: row.text("grupo"),
            edad: row.integer("edad"),
            certificacion_medica: row.text("certificacion_medica"),
            sexo: row.text("sexo"),
            peso: row.float("peso"),
            perimetro: row.float("perimetro"),
            estatura: row.float("estatura"),
            tension: row.text("tension"),
            tension_a: row.integer("tension_a"),
            presion_a: row.integer("presion_a"),
            tension_d: row.integer("tension_d"),
            frecuencia: row.integer("frecuencia"),
            temperatura: row.float("temperatura"),
            saturacion: row.float("saturacion"),
            glucometria: row.float("glucometria"),
            imc: row.float("imc"),
            clasificacion: row.text("clasificacion"),
            imp: row.text("imp"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn comma_decimal_weight_maps_to_float() {
        let mapped = map_row(&["Peso (kg)"], &row(&["72,5"]));
        assert_eq!(mapped.get("peso"), Some(Some(&Value::Float(72.5))));
        assert_eq!(mapped.len(), 1);
    }

    #[test]
    fn unmatched_targets_are_omitted_from_mapping() {
        let mapped = map_row(&["curp"], &row(&["ABCD010101HDFXXX01"]));
        assert_eq!(mapped.matched_targets().collect::<Vec<_>>(), vec!["curp"]);
        assert_eq!(mapped.get("peso"), None);

        let fields = SomatometriaFields::from(&mapped);
        assert_eq!(fields.curp.as_deref(), Some("ABCD010101HDFXXX01"));
        assert_eq!(fields.peso, None);
    }

    #[test]
    fn unparseable_numbers_coerce_to_null() {
        let mapped = map_row(&["Edad", "Peso"], &row(&["diecisiete", ""]));
        assert_eq!(mapped.get("edad"), Some(None));
        assert_eq!(mapped.get("peso"), Some(None));
    }

    #[test]
    fn numeric_fields_keep_the_value_before_a_unit() {
        let headers = ["Edad", "Peso", "Estatura", "Frecuencia"];
        let fields = SomatometriaFields::from(&map_row(
            &headers,
            &row(&["20 años", "72,5 kg", "1.62 m", "80.0"]),
        ));
        assert_eq!(fields.edad, Some(20));
        assert_eq!(fields.peso, Some(72.5));
        assert_eq!(fields.estatura, Some(1.62));
        assert_eq!(fields.frecuencia, Some(80));
    }

    #[test]
    fn empty_text_coerces_to_null() {
        let mapped = map_row(&["Sexo"], &row(&[""]));
        assert_eq!(mapped.get("sexo"), Some(None));
    }

    #[test]
    fn first_matching_header_wins() {
        let headers = ["Tension A", "Tension D"];
        let mapped = map_row(&headers, &row(&["120", "80"]));
        assert_eq!(mapped.get("tension"), Some(Some(&Value::String("120".into()))));
        assert_eq!(mapped.get("tension_a"), Some(Some(&Value::Integer(120))));
        assert_eq!(mapped.get("tension_d"), Some(Some(&Value::Integer(80))));
    }

    #[test]
    fn overlapping_aliases_follow_dictionary_order() {
        let mapped = map_row(&["Clasificacion"], &row(&["Normal"]));
        assert_eq!(
            mapped.get("clasificacion"),
            Some(Some(&Value::String("Normal".into())))
        );
        assert_eq!(mapped.get("imp"), Some(Some(&Value::String("Normal".into()))));
    }

    #[test]
    fn english_aliases_are_recognized() {
        let headers = ["Name", "Age", "Height", "BMI"];
        let fields = SomatometriaFields::from(&map_row(&headers, &row(&["Ana", "16", "1,62", "21.4"])));
        assert_eq!(fields.nombre.as_deref(), Some("Ana"));
        assert_eq!(fields.edad, Some(16));
        assert_eq!(fields.estatura, Some(1.62));
        assert_eq!(fields.imc, Some(21.4));
    }

    #[test]
    fn short_rows_read_missing_cells_as_empty() {
        let mapped = map_row(&["curp", "edad"], &row(&["X"]));
        assert_eq!(mapped.get("edad"), Some(None));
    }

    #[test]
    fn dictionary_targets_are_unique() {
        for (idx, spec) in FIELD_DICTIONARY.iter().enumerate() {
            assert!(
                FIELD_DICTIONARY[idx + 1..]
                    .iter()
                    .all(|other| other.target != spec.target),
                "duplicate target {}",
                spec.target
            );
        }
    }
}
