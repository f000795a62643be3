use serde_json::{Map, Value};

/// Deep-merge `src` into `dst`.
///
/// Where both sides hold an object the merge recurses; in every other case
/// the value from `src` replaces the one in `dst`.
pub fn merge_tree(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (key, value) in src {
        match value {
            Value::Object(src_child) => {
                if let Some(Value::Object(dst_child)) = dst.get_mut(&key) {
                    merge_tree(dst_child, src_child);
                    continue;
                }
                dst.insert(key, Value::Object(src_child));
            }
            value => {
                dst.insert(key, value);
            }
        }
    }
}

/// Insert `value` at the nested `path`, creating (or replacing scalars with)
/// objects along the way.
pub fn insert_path(tree: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut node = tree;
    for key in parents {
        let child = node
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !child.is_object() {
            *child = Value::Object(Map::new());
        }
        node = match child {
            Value::Object(map) => map,
            _ => unreachable!("child was just made an object"),
        };
    }
    node.insert(last.to_string(), value);
}
