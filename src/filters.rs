//! Optional query filters and the local value-range predicate.

use clap::ValueEnum;
use std::collections::BTreeMap;
use tracing::info;

use crate::record::Record;

/// `materialOuServico` values accepted by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MaterialOrService {
    /// Material ("M")
    #[value(name = "M", alias = "m")]
    Material,
    /// Service ("S")
    #[value(name = "S", alias = "s")]
    Service,
}

impl MaterialOrService {
    pub fn code(self) -> &'static str {
        match self {
            MaterialOrService::Material => "M",
            MaterialOrService::Service => "S",
        }
    }
}

/// User-facing filter values. Every field is optional; empty strings count
/// as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub org_cnpj: Option<String>,
    pub org_unit_code: Option<i64>,
    pub item_status: Option<String>,
    pub material_or_service: Option<MaterialOrService>,
    pub class_code: Option<i64>,
    pub group_code: Option<i64>,
    pub supplier_code: Option<String>,
    pub has_result: Option<bool>,
    pub bps: Option<bool>,
    pub normal_preference_margin: Option<bool>,
    pub ncm_code: Option<String>,
}

/// Query parameters merged verbatim into every page request.
///
/// A key is only present when its source value was set and non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: BTreeMap<String, String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(opts: &FilterOptions) -> Self {
        let mut set = Self::new();
        set.insert_str("orgaoEntidadeCnpj", opts.org_cnpj.as_deref());
        set.insert_int("unidadeOrgaoCodigoUnidade", opts.org_unit_code);
        set.insert_str("situacaoCompraItem", opts.item_status.as_deref());
        set.insert_str(
            "materialOuServico",
            opts.material_or_service.map(MaterialOrService::code),
        );
        set.insert_int("codigoClasse", opts.class_code);
        set.insert_int("codigoGrupo", opts.group_code);
        set.insert_str("codFornecedor", opts.supplier_code.as_deref());
        set.insert_flag("temResultado", opts.has_result);
        set.insert_flag("bps", opts.bps);
        set.insert_flag("margemPreferenciaNormal", opts.normal_preference_margin);
        set.insert_str("codigoNCM", opts.ncm_code.as_deref());
        set
    }

    pub fn insert_str(&mut self, key: &str, value: Option<&str>) {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.entries.insert(key.to_string(), v.to_string());
        }
    }

    pub fn insert_int(&mut self, key: &str, value: Option<i64>) {
        if let Some(v) = value {
            self.entries.insert(key.to_string(), v.to_string());
        }
    }

    pub fn insert_flag(&mut self, key: &str, value: Option<bool>) {
        if let Some(v) = value {
            self.entries.insert(key.to_string(), bool_flag(v).to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Renders a boolean the way the API expects it.
pub fn bool_flag(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Inclusive bounds on the awarded unit price, applied after fetching.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    /// Keeps the records whose price falls inside the range. Records
    /// without a numeric price are dropped. An inactive range keeps
    /// everything, priced or not.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        if !self.is_active() {
            return records;
        }

        let before = records.len();
        let kept: Vec<Record> = records
            .into_iter()
            .filter(|r| r.price().is_some_and(|p| self.contains(p)))
            .collect();

        info!(
            min = ?self.min,
            max = ?self.max,
            before,
            after = kept.len(),
            "Value range filter applied"
        );
        kept
    }
}
