//! Ready-made transforms for [`Node::transform`](crate::Node::transform).

use weave_runtime::ParseValue;

/// Keeps only the argument at `index`, or null if there are fewer arguments.
pub fn nth<V: ParseValue + 'static>(index: usize) -> impl Fn(Vec<V>) -> V + Send + Sync + 'static {
    move |args| args.into_iter().nth(index).unwrap_or_else(V::null)
}

/// Flattens the list arguments at `positions` into the surrounding arguments before calling
/// `fun`. Arguments at those positions which are not lists are passed through unchanged.
pub fn splice<V, F>(
    positions: impl IntoIterator<Item = usize>,
    fun: F,
) -> impl Fn(Vec<V>) -> V + Send + Sync + 'static
where
    V: ParseValue + 'static,
    F: Fn(Vec<V>) -> V + Send + Sync + 'static,
{
    let mut positions: Vec<usize> = positions.into_iter().collect();
    positions.sort_unstable();
    positions.dedup();

    move |args| {
        let mut out = Vec::with_capacity(args.len());
        for (i, arg) in args.into_iter().enumerate() {
            if positions.binary_search(&i).is_err() {
                out.push(arg);
                continue;
            }
            match arg.try_into_list() {
                Ok(items) => out.extend(items),
                Err(arg) => out.push(arg),
            }
        }
        fun(out)
    }
}
