use std::collections::HashMap;

/// The reserved key carrying a free-form filter expression
pub const FILTER_KEY: &str = "filter";

/// Column name to the raw value supplied by the caller
pub type ParameterSet = HashMap<String, String>;

///
/// The parameters of one request, split into column values and an optional filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decomposed {
    pub params: ParameterSet,
    pub filter: Option<String>,
}

impl Decomposed {
    ///
    /// The supplied `(column, value)` pairs, in the order of the given columns
    pub fn pairs_in<'a>(&'a self, columns: &[&'a str]) -> Vec<(&'a str, &'a str)> {
        columns
            .iter()
            .filter_map(|col| self.params.get(*col).map(|val| (*col, val.as_str())))
            .collect()
    }

    /// Whether any of the given columns was supplied
    pub fn has_any(&self, columns: &[&str]) -> bool {
        columns.iter().any(|col| self.params.contains_key(*col))
    }

    ///
    /// What the caller submitted, echoed back in responses
    pub fn submitted(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (k, v) in &self.params {
            map.insert(k.clone(), serde_json::Value::String(v.clone()));
        }
        if let Some(filter) = &self.filter {
            map.insert(
                FILTER_KEY.to_string(),
                serde_json::Value::String(filter.clone()),
            );
        }
        serde_json::Value::Object(map)
    }
}

///
/// Split a `key1/value1/key2/value2` path suffix into key-value pairs.
///
/// Keys are lower-cased, values are kept as they are.
/// A `filter` key takes the whole rest of the path as its value,
/// e.g. `user_id/3/filter/heart_rate/2 > 50` has the filter `heart_rate/2 > 50`.
/// A dangling last segment is glued back onto the previous value with `/`.
/// # Examples
/// ```
/// use pathstore::sqlite::decompose::split_path_pairs;
/// let pairs = split_path_pairs("username/bob/password/x");
/// assert_eq!(pairs, vec![
///     ("username".to_string(), "bob".to_string()),
///     ("password".to_string(), "x".to_string()),
/// ]);
/// ```
pub fn split_path_pairs(path: &str) -> Vec<(String, String)> {
    let path = path.trim_matches('/');
    if path.is_empty() {
        return vec![];
    }
    let segments = path.split('/').collect::<Vec<&str>>();
    let mut pairs: Vec<(String, String)> = vec![];
    let mut idx = 0;
    while idx < segments.len() {
        let key = segments[idx].to_lowercase();
        if key == FILTER_KEY {
            pairs.push((key, segments[idx + 1..].join("/")));
            break;
        }
        match segments.get(idx + 1) {
            Some(value) => pairs.push((key, value.to_string())),
            None => match pairs.last_mut() {
                Some((_, value)) => {
                    value.push('/');
                    value.push_str(segments[idx]);
                }
                None => pairs.push((key, String::new())),
            },
        }
        idx += 2;
    }
    pairs
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

///
/// Turn the path suffix and the query parameters of a request into a [Decomposed].
///
/// - `filter` is taken from the path first, then from the query parameters
/// - every other key is kept only when it's one of `known_columns`, unknown keys are ignored
/// - query parameters override path parameters with the same key
/// - empty values count as absent
/// # Arguments
/// * `path` - the path suffix after the table name, possibly empty
/// * `query` - the query parameters in the order they were received
/// * `known_columns` - the columns the parameters may address
pub fn decompose(path: &str, query: &[(String, String)], known_columns: &[&str]) -> Decomposed {
    let path_pairs = split_path_pairs(path);
    let mut params = ParameterSet::new();
    let mut path_filter = None;
    let mut query_filter = None;
    for (key, value) in &path_pairs {
        if key == FILTER_KEY {
            path_filter = path_filter.or(non_empty(value));
        } else if known_columns.contains(&key.as_str()) {
            if let Some(value) = non_empty(value) {
                params.insert(key.clone(), value);
            }
        }
    }
    for (key, value) in query {
        if key == FILTER_KEY {
            query_filter = query_filter.or(non_empty(value));
        } else if known_columns.contains(&key.as_str()) {
            match non_empty(value) {
                Some(value) => {
                    params.insert(key.clone(), value);
                }
                None => {
                    params.remove(key);
                }
            }
        }
    }
    Decomposed {
        params,
        filter: path_filter.or(query_filter),
    }
}

///
/// Collect `column -> TYPE` definitions for a new table from `/<col>/<TYPE>/...` path pairs
/// and `col=TYPE` query pairs. Column names are lower-cased, types upper-cased.
/// The order of first appearance is kept, a query pair overrides the type of a path pair.
pub fn map_column_types(path: &str, query: &[(String, String)]) -> Vec<(String, String)> {
    let mut columns: Vec<(String, String)> = vec![];
    let query_pairs = query
        .iter()
        .map(|(k, v)| (k.trim().to_lowercase(), v.clone()));
    for (name, sql_type) in split_path_pairs(path).into_iter().chain(query_pairs) {
        let sql_type = sql_type.trim().to_uppercase();
        match columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing_type)) => *existing_type = sql_type,
            None => columns.push((name, sql_type)),
        }
    }
    columns
}
