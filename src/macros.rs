//! Operator boilerplate shared by both bitmap widths.

/// Implements `&`, `|`, `^`, `-` and their assigning forms for a bitmap type
/// in terms of its inherent `and`/`or`/`xor`/`and_not` methods and their
/// `_assign` counterparts.
macro_rules! set_operators {
    ($type:ty: $($trait:ident, $method:ident => $inherent:ident;)*) => {
        paste::paste! {
            $(
                impl std::ops::$trait<&$type> for &$type {
                    type Output = $type;

                    #[inline]
                    fn $method(self, rhs: &$type) -> $type {
                        self.$inherent(rhs)
                    }
                }

                impl std::ops::$trait<&$type> for $type {
                    type Output = $type;

                    #[inline]
                    fn $method(mut self, rhs: &$type) -> $type {
                        self.[<$inherent _assign>](rhs);
                        self
                    }
                }

                impl std::ops::$trait<$type> for $type {
                    type Output = $type;

                    #[inline]
                    fn $method(mut self, rhs: $type) -> $type {
                        self.[<$inherent _assign>](&rhs);
                        self
                    }
                }

                impl std::ops::[<$trait Assign>]<&$type> for $type {
                    #[inline]
                    fn [<$method _assign>](&mut self, rhs: &$type) {
                        self.[<$inherent _assign>](rhs);
                    }
                }

                impl std::ops::[<$trait Assign>]<$type> for $type {
                    #[inline]
                    fn [<$method _assign>](&mut self, rhs: $type) {
                        self.[<$inherent _assign>](&rhs);
                    }
                }
            )*
        }
    };
}
