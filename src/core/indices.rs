use hashbrown::HashMap;

use crate::types::ContactId;

pub type VecIndex<K> = HashMap<K, Vec<ContactId>>;
