use super::translate::ParamValue;
use super::types::{FindOptions, Order, SortSpec};

/// Control keys of the list endpoint, parsed from the same parameters the translator sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub find: FindOptions,
    /// `count=exact`: attach the total match count to the page.
    pub count: bool,
    /// `head=true`: only the count, no documents.
    pub head: bool,
}

impl ReadOptions {
    #[must_use]
    pub fn from_params(params: &[(String, ParamValue)]) -> Self {
        let get = |key: &str| params.iter().find(|(k, _)| k == key).and_then(|(_, v)| v.last());

        let projection = get("select").and_then(parse_select);
        let sort = get("sort").map(str::trim).filter(|f| !f.is_empty()).map(|field| {
            let order = match get("order") {
                Some(o) if o.eq_ignore_ascii_case("desc") => Order::Desc,
                _ => Order::Asc,
            };
            vec![SortSpec { field: field.to_string(), order }]
        });
        let limit = get("limit").and_then(|raw| match raw.trim().parse::<usize>() {
            Ok(n) => Some(n),
            Err(e) => {
                log::warn!("ignoring limit={raw:?}: {e}");
                None
            }
        });

        Self {
            find: FindOptions { projection, sort, limit },
            count: get("count").is_some_and(|v| v == "exact"),
            head: get("head").is_some_and(|v| v == "true"),
        }
    }
}

fn parse_select(raw: &str) -> Option<Vec<String>> {
    let fields: Vec<String> =
        raw.split(',').map(str::trim).filter(|f| !f.is_empty()).map(str::to_string).collect();
    if fields.is_empty() || fields.iter().any(|f| f == "*") {
        return None;
    }
    Some(fields)
}
