use std::borrow::Cow;
use std::ops::Deref;

/// A borrowed-or-owned byte buffer, used for every key and value crossing
/// the [`crate::Database`] boundary so callers can avoid allocating when
/// they already hold the bytes (e.g. a key built once and reused across a
/// `get` + `has` pair).
#[derive(Clone, Debug)]
pub struct Slice<'a>(Cow<'a, [u8]>);

impl<'a> Slice<'a> {
    #[must_use]
    pub fn into_boxed(self) -> Slice<'static> {
        Slice(Cow::Owned(self.0.into_owned()))
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0.into_owned()
    }
}

impl Deref for Slice<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Slice<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for Slice<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}

impl Eq for Slice<'_> {}

impl<'a> PartialEq<[u8]> for Slice<'a> {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_ref() == other
    }
}

impl<'a, const N: usize> PartialEq<[u8; N]> for Slice<'a> {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_ref() == other.as_slice()
    }
}

impl<'a> From<&'a [u8]> for Slice<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Slice(Cow::Borrowed(bytes))
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Slice<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Slice(Cow::Borrowed(&bytes[..]))
    }
}

impl From<Vec<u8>> for Slice<'static> {
    fn from(bytes: Vec<u8>) -> Self {
        Slice(Cow::Owned(bytes))
    }
}

impl From<Box<[u8]>> for Slice<'static> {
    fn from(bytes: Box<[u8]>) -> Self {
        Slice(Cow::Owned(bytes.into_vec()))
    }
}

impl<'a> From<&'a Slice<'_>> for Slice<'a> {
    fn from(value: &'a Slice<'_>) -> Self {
        Slice(Cow::Borrowed(value.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrowed_and_owned_compare_equal() {
        let data = b"hello";
        let borrowed = Slice::from(&data[..]);
        let owned = borrowed.clone().into_boxed();
        assert_eq!(borrowed, owned);
        assert_eq!(&*owned.into_boxed(), data);
    }

    #[test]
    fn reborrow_from_reference() {
        let owned: Slice<'static> = Slice::from(vec![1, 2, 3]);
        let reborrowed: Slice<'_> = (&owned).into();
        assert_eq!(reborrowed.as_ref(), &[1, 2, 3]);
    }
}
