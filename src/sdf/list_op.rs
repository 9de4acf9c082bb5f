//! List editing operations as authored on composition metadata.

/// The edit lists that may contribute entries to a list op, in scan order.
///
/// `deleted` is intentionally absent: deleted items never introduce a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListOpKind {
    Appended,
    Explicit,
    Added,
    Prepended,
    Ordered,
}

impl ListOpKind {
    pub const ALL: [ListOpKind; 5] = [
        ListOpKind::Appended,
        ListOpKind::Explicit,
        ListOpKind::Added,
        ListOpKind::Prepended,
        ListOpKind::Ordered,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ListOpKind::Appended => "appended",
            ListOpKind::Explicit => "explicit",
            ListOpKind::Added => "added",
            ListOpKind::Prepended => "prepended",
            ListOpKind::Ordered => "ordered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListOp<T> {
    pub explicit: bool,
    pub explicit_items: Vec<T>,
    pub added_items: Vec<T>,
    pub prepended_items: Vec<T>,
    pub appended_items: Vec<T>,
    pub deleted_items: Vec<T>,
    pub ordered_items: Vec<T>,
}

impl<T> ListOp<T> {
    /// Items of a single edit list.
    pub fn items(&self, kind: ListOpKind) -> &[T] {
        match kind {
            ListOpKind::Appended => &self.appended_items,
            ListOpKind::Explicit => &self.explicit_items,
            ListOpKind::Added => &self.added_items,
            ListOpKind::Prepended => &self.prepended_items,
            ListOpKind::Ordered => &self.ordered_items,
        }
    }

    /// Every item of every edit list, scanned appended, explicit, added, prepended, ordered.
    pub fn edit_items(&self) -> impl Iterator<Item = (ListOpKind, &T)> + '_ {
        ListOpKind::ALL
            .into_iter()
            .flat_map(move |kind| self.items(kind).iter().map(move |item| (kind, item)))
    }

    /// Fold another list op authored on the same spec (e.g. `prepend` and `append` lines) into this one.
    pub fn merge(&mut self, other: ListOp<T>) {
        self.explicit |= other.explicit;
        self.explicit_items.extend(other.explicit_items);
        self.added_items.extend(other.added_items);
        self.prepended_items.extend(other.prepended_items);
        self.appended_items.extend(other.appended_items);
        self.deleted_items.extend(other.deleted_items);
        self.ordered_items.extend(other.ordered_items);
    }

    pub fn is_empty(&self) -> bool {
        !self.explicit && ListOpKind::ALL.iter().all(|kind| self.items(*kind).is_empty()) && self.deleted_items.is_empty()
    }
}

impl<T: PartialEq> ListOp<T> {
    /// Items that take part in composition when this list op is applied on its own.
    pub fn composed_items(&self) -> Vec<&T> {
        if self.explicit {
            return self.explicit_items.iter().collect();
        }

        self.prepended_items
            .iter()
            .chain(self.added_items.iter())
            .chain(self.appended_items.iter())
            .filter(|item| !self.deleted_items.contains(item))
            .collect()
    }
}
