//! Packed names and paths tables.
//!
//! Names are stored as a single null-separated byte buffer: the model name
//! first, then every entity's name in kind order. Lookup goes through an
//! open-addressed hash map with `LOAD_MULTIPLE` slots per entity, keyed by a
//! djb2 hash with linear probing and a `-1` empty-slot sentinel. The paths
//! buffer uses the same concatenation but no map; when no asset has a file a
//! single NUL is stored so the buffer is never empty.

/// Hash-map slots allocated per entity of a kind.
pub const LOAD_MULTIPLE: usize = 4;

/// djb2 over the name bytes, reduced modulo the per-kind map capacity.
#[must_use]
pub fn hash_djb2(name: &str, map_size: usize) -> usize {
    let mut h: u64 = 5381;
    for &b in name.as_bytes() {
        h = h.wrapping_mul(33).wrapping_add(u64::from(b));
    }
    (h % map_size as u64) as usize
}

/// Append `s` and a terminating NUL to `buf`, returning the start address.
pub fn append_str(buf: &mut Vec<u8>, s: &str) -> i32 {
    let adr = buf.len() as i32;
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
    adr
}

/// Insert the names of one entity kind into its map segment.
///
/// `map` is the kind's slice of the global map, sized `LOAD_MULTIPLE * n`.
/// Empty names are not inserted (they stay unreachable by name lookup).
pub fn insert_names(names: &[String], map: &mut [i32]) {
    let map_size = map.len();
    if map_size == 0 {
        return;
    }
    for (i, name) in names.iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        let mut j = hash_djb2(name, map_size);
        while map[j] != -1 {
            j = (j + 1) % map_size;
        }
        map[j] = i as i32;
    }
}

/// Read the NUL-terminated string starting at `adr` from a packed buffer.
#[must_use]
pub fn read_str(buf: &[u8], adr: i32) -> &str {
    if adr < 0 {
        return "";
    }
    let start = adr as usize;
    let end = buf[start..]
        .iter()
        .position(|&b| b == 0)
        .map_or(buf.len(), |p| start + p);
    std::str::from_utf8(&buf[start..end]).unwrap_or("")
}

/// Look up a name in one kind's map segment.
///
/// `name_adr` is the kind's per-entity address array into `names`.
/// Probing stops at the first empty slot: absent names miss in O(1) expected.
#[must_use]
pub fn lookup(names: &[u8], name_adr: &[i32], map: &[i32], name: &str) -> Option<usize> {
    let map_size = map.len();
    if map_size == 0 || name.is_empty() {
        return None;
    }
    let mut j = hash_djb2(name, map_size);
    for _ in 0..map_size {
        let id = map[j];
        if id == -1 {
            return None;
        }
        if read_str(names, name_adr[id as usize]) == name {
            return Some(id as usize);
        }
        j = (j + 1) % map_size;
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn build(names: &[&str]) -> (Vec<u8>, Vec<i32>, Vec<i32>) {
        let owned: Vec<String> = names.iter().map(|s| (*s).to_string()).collect();
        let mut buf = Vec::new();
        let adrs: Vec<i32> = owned.iter().map(|n| append_str(&mut buf, n)).collect();
        let mut map = vec![-1; LOAD_MULTIPLE * owned.len()];
        insert_names(&owned, &mut map);
        (buf, adrs, map)
    }

    #[test]
    fn round_trip_lookup() {
        let (buf, adrs, map) = build(&["torso", "thigh", "shin", "foot"]);
        for (i, name) in ["torso", "thigh", "shin", "foot"].iter().enumerate() {
            assert_eq!(lookup(&buf, &adrs, &map, name), Some(i));
        }
        assert_eq!(lookup(&buf, &adrs, &map, "hand"), None);
    }

    #[test]
    fn empty_names_not_inserted() {
        let (buf, adrs, map) = build(&["", "a", ""]);
        assert_eq!(lookup(&buf, &adrs, &map, "a"), Some(1));
        assert_eq!(lookup(&buf, &adrs, &map, ""), None);
    }

    #[test]
    fn probing_resolves_collisions() {
        // Many names in a small table force probe chains; all must resolve.
        let names: Vec<String> = (0..32).map(|i| format!("geom_{i}")).collect();
        let mut buf = Vec::new();
        let adrs: Vec<i32> = names.iter().map(|n| append_str(&mut buf, n)).collect();
        let mut map = vec![-1; LOAD_MULTIPLE * names.len()];
        insert_names(&names, &mut map);
        for (i, n) in names.iter().enumerate() {
            assert_eq!(lookup(&buf, &adrs, &map, n), Some(i), "name {n}");
        }
    }

    #[test]
    fn buffer_layout_is_null_separated() {
        let (buf, adrs, _) = build(&["ab", "c"]);
        assert_eq!(buf, b"ab\0c\0");
        assert_eq!(adrs, vec![0, 3]);
        assert_eq!(read_str(&buf, 3), "c");
    }
}
