//! Heterogeneous sequences whose positions can’t go wrong.
//!
//! **Tyctx** implements *contexts*:
//! fixed-shape sequences whose length
//! and whose per-slot *kind* are known statically,
//! together with *indices* that can only ever
//! point at a slot of the kind they claim.
//!
//! # Contexts and assignments
//!
//! A context is a type-level list of kinds,
//! built from the right like a stack:
//! [`ctx::EmptyCtx`], then [`ctx::Snoc`]`<C, T>`
//! for “`C` with one more slot of kind `T` at the end”.
//! The [`ctx!`] macro spells these out, first slot first.
//!
//! An [`assignment::Assignment`]`<C, F>` is the runtime value:
//! one value per slot of `C`,
//! where a slot of kind `T` holds an `F::Of<T>`
//! for some [`kind::Family`] `F`.
//! With the default family, [`kind::Id`],
//! a slot of kind `T` just holds a `T`.
//!
//! ```
//! use tyctx::{assign, ctx};
//! use tyctx::index::{base, last_index};
//!
//! let a = assign![10_i64, String::from("x"), true];
//! let first = base::<i64>().extend_known::<ctx![i64, String, bool], _>();
//! let last = last_index(a.size());
//!
//! assert_eq!(a[first], 10);
//! assert!(a[last]);
//! ```
//!
//! # Trustworthiness
//!
//! An [`index::Index`]`<C, T>` is *knowledge*:
//! it proves that slot `i` of `C` has kind `T`.
//! All of the safe constructors maintain this,
//! so lookup needs no bounds check and no kind check.
//! The type of the index rules out both.
//!
//! Growing a context doesn’t invalidate its indices.
//! A [`diff::Diff`]`<L, R>` proves that `R` is `L`
//! with some slots appended,
//! and carries any index of `L` over to `R`
//! without looking at its position again.
//!
//! # No extra checks
//!
//! Some checks are strictly necessary.
//! Turning an arbitrary integer into an index
//! ([`index::int_index`]) must compare it to the length,
//! and it says so by returning an `Option`.
//! Once you have a typed index, though,
//! the check has been done, and isn’t repeated.
//!
//! Debug builds do re-check the kind on every lookup,
//! as a tripwire for code that forged an index
//! with [`index::Index::new_unchecked`].
//! The `checked-kinds` feature keeps that check in release builds.
//!
//! # Runtime shapes
//!
//! When the shape of a sequence is only known at runtime,
//! the [`dynamic`] module offers the same vocabulary
//! over a vector of boxed values.
//! There, the context is a generative *name*
//! (see [`mod@call`]),
//! and lookup is governed:
//! turning a position into an index checks the length and the kind,
//! and reports either failure as an [`error::Error`].
//!

#![warn(missing_docs)]

pub mod name {

    //! Static, type-level names for runtime values.
    //!
    //! Names are represented using lifetime variables.
    //! For more on why, see [`mod@crate::call`].

    use core::marker::PhantomData;

    /// A name tag, which you can make for free.
    ///
    /// Invariant in `'name`,
    /// so two different names never unify by subtyping.
    #[derive(Copy, Clone)]
    pub struct Name<'name>(PhantomData<fn(&'name ()) -> &'name ()>);

    /// Make a name tag.
    pub const fn name<'name>() -> Name<'name> {
        Name(PhantomData)
    }
}

pub mod call {

    //! `name ≡ value` relationships:
    //! *define* a unique static name for a dynamic value.
    //!
    //! A dynamic context has no type-level list of kinds,
    //! so it needs some other statically known, unique constant
    //! to tie its indices to.
    //! We can write rank-1 existential quantification
    //! using rank-2 universal quantification,
    //! which Rust allows for lifetime variables,
    //! so the name is a lifetime.

    use super::link::Link;
    use super::name::name;
    use core::ops::Deref;

    /// A value that’s called by a name.
    pub struct Call<'name, T> {
        link: Link<'name, T>,
    }

    impl<'name, T> Call<'name, T> {
        /// Forgets its own name.
        pub fn into_owned(self) -> T {
            self.link.body
        }

        /// Changes the body *without* changing the name.
        ///
        /// # Safety
        ///
        /// Must uphold all trusted knowledge of `'name`:
        /// for a dynamic context, its length and slot kinds.
        ///
        pub unsafe fn as_mut(&mut self) -> &mut T {
            &mut self.link.body
        }
    }

    impl<'name, T> Deref for Call<'name, T> {
        type Target = T;
        fn deref(&self) -> &T {
            &self.link.body
        }
    }

    /// Bestows a `'name` on something.
    ///
    /// Knowledge about the `'name`
    /// is now seen as knowledge about the named thing.
    ///
    /// # Safety
    ///
    /// Every bearer of this name must agree with
    /// what is known about it.
    /// Otherwise, knowledge about the name might not be true.
    ///
    pub const unsafe fn forge<'name, T>(
        body: T,
    ) -> Call<'name, T> {
        Call {
            link: Link {
                body,
                name: name::<'name>(),
            },
        }
    }
}

pub mod called {

    //! Gives names to values.

    use super::call::{forge, Call};

    /// The set of types whose values can be called by a name.
    pub trait Called {
        /// Gives `self` a new name and evaluates `body`.
        ///
        /// ```
        /// use tyctx::called::Called;
        /// use tyctx::dynamic::{DynAssignment, Slot};
        ///
        /// let len = Vec::<Box<dyn Slot>>::new().called(|slots| {
        ///     let ctx = DynAssignment::from(slots);
        ///     ctx.push(1_u8, |ctx, _, _| ctx.len())
        /// });
        /// assert_eq!(len, 1);
        /// ```
        ///
        fn called<Out, Body>(self, body: Body) -> Out
        where
            Body: for<'call> FnOnce(Call<'call, Self>) -> Out,
            Self: Sized;
    }

    /// Anything with a size can be called by a name.
    impl<T> Called for T
    where
        T: Sized,
    {
        fn called<Out, Body>(self, body: Body) -> Out
        where
            Body: for<'call> FnOnce(Call<'call, Self>) -> Out,
            Self: Sized,
        {
            body(unsafe { forge(self) })
        }
    }
}

pub mod link {

    //! `name × value` relationships:
    //! *pair* a static name with a dynamic value.

    use super::name::{name, Name};

    /// A value, paired with a name
    /// that doesn’t have to be the name of the value itself.
    /// Most often it’s a position in the named context.
    ///
    /// # Safety
    ///
    /// It’s always *safe* to link to a name, but that means
    /// a link doesn’t necessarily say anything *trustworthy*
    /// about the relationship between `body` and `'name`.
    /// For that, wrap it,
    /// as [`crate::dynamic::DynIndex`] does.
    ///
    #[derive(Copy, Clone)]
    pub struct Link<'name, T> {
        /// The value of the link.
        pub body: T,
        /// The name it is linked to.
        pub name: Name<'name>,
    }

    /// Pair a value with a name,
    /// where the value doesn’t lay claim to the name.
    pub const fn link<'name, T>(body: T) -> Link<'name, T> {
        Link {
            body,
            name: name::<'name>(),
        }
    }
}

pub mod proof {

    //! Static proofs of type equality.
    //!
    //! Looking up a slot has to turn the value stored there,
    //! whose kind the context knows,
    //! into a value of the kind the index claims.
    //! A [`Same`] proof is what licenses that.

    use super::kind::Family;
    use core::marker::PhantomData;
    use core::mem::ManuallyDrop;
    use core::ptr;

    /// Proof of proposition `A`.
    pub struct Prf<A>(PhantomData<fn(A) -> A>);

    impl<A> Clone for Prf<A> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<A> Copy for Prf<A> {}

    /// Type equality: `A` and `B` are one type.
    ///
    /// Invariant in both, so a proof can’t be
    /// stretched over a lifetime by subtyping.
    pub struct Same<A, B>(PhantomData<fn(A, B) -> (A, B)>);

    /// Unsafely assume a proposition. It’s best to use this
    /// with an explicit type argument (turbofish) to document
    /// the intention, like `assume::<Same<T, U>>()`.
    ///
    /// # Safety
    ///
    /// The proposition must be true.
    ///
    pub unsafe fn assume<A>() -> Prf<A> {
        axiom()
    }

    /// Privately define an axiom.
    fn axiom<A>() -> Prf<A> {
        Prf(PhantomData)
    }

    /// Every type is itself.
    pub fn refl<A>() -> Prf<Same<A, A>> {
        axiom()
    }

    /// Type equality is symmetric.
    pub fn symm<A, B>(
        _a_is_b: &Prf<Same<A, B>>,
    ) -> Prf<Same<B, A>> {
        axiom()
    }

    /// Type equality is transitive.
    pub fn trans<A, B, C>(
        _a_is_b: &Prf<Same<A, B>>,
        _b_is_c: &Prf<Same<B, C>>,
    ) -> Prf<Same<A, C>> {
        axiom()
    }

    impl<A, B> Prf<Same<A, B>> {
        /// Equal kinds have equal values in any family.
        pub fn lift<F: Family>(
            &self,
        ) -> Prf<Same<F::Of<A>, F::Of<B>>> {
            axiom()
        }

        /// Reinterprets an `A` as a `B`.
        pub fn coerce(&self, value: A) -> B {
            let value = ManuallyDrop::new(value);
            // Upholds `read`: `A` is `B`, and `value`
            // is never dropped as an `A`.
            unsafe { ptr::read(&*value as *const A as *const B) }
        }

        /// Reinterprets a reference to an `A`.
        pub fn coerce_ref<'a>(&self, value: &'a A) -> &'a B {
            unsafe { &*(value as *const A as *const B) }
        }

        /// Reinterprets a mutable reference to an `A`.
        pub fn coerce_mut<'a>(
            &self,
            value: &'a mut A,
        ) -> &'a mut B {
            unsafe { &mut *(value as *mut A as *mut B) }
        }
    }
}

pub mod kind {

    //! Families: what a slot of each kind holds.
    //!
    //! A context only lists kinds.
    //! The family of an assignment says
    //! which Rust type stores a value of each kind,
    //! so one context (and its indices) can describe
    //! values, defaults, indices, rendered text, and so on.

    use super::index::Index;
    use core::marker::PhantomData;

    /// A type-level function from kinds to value types.
    pub trait Family {
        /// The type of a value of kind `T`.
        type Of<T>;
    }

    /// Each slot holds a value of its own kind.
    pub enum Id {}

    impl Family for Id {
        type Of<T> = T;
    }

    /// Every slot holds an `R`, whatever its kind.
    pub struct Const<R>(PhantomData<fn(R) -> R>);

    impl<R> Family for Const<R> {
        type Of<T> = R;
    }

    /// Each slot maybe holds a value of its kind.
    pub enum OptionOf {}

    impl Family for OptionOf {
        type Of<T> = Option<T>;
    }

    /// Each slot holds an index into `C` of the slot’s kind.
    pub struct IndexOf<C>(PhantomData<fn(C) -> C>);

    impl<C> Family for IndexOf<C> {
        type Of<T> = Index<C, T>;
    }
}

pub mod ctx {

    //! Contexts: type-level lists of kinds.

    use super::kind::Family;
    use super::proof::{assume, Prf, Same};
    use super::size::{inc_size, zero_size, Size};
    use core::any::{type_name, TypeId};
    use core::marker::PhantomData;

    /// The context with no slots.
    pub enum EmptyCtx {}

    /// The context `C` with one more slot, of kind `T`,
    /// appended at the end.
    pub struct Snoc<C, T>(PhantomData<fn(C, T) -> (C, T)>);

    /// Contexts whose shape is fixed by the code itself.
    ///
    /// This is the only way to make a context,
    /// so every context knows its own size.
    pub trait Context: Sized + 'static {
        /// Number of slots.
        const SIZE: usize;

        /// The nested pairs that store an assignment:
        /// `()` for no slots,
        /// `(init, last)` for one more.
        type Repr<F: Family>;

        /// Witness for the size of this context.
        fn known_size() -> Size<Self>;

        #[doc(hidden)]
        fn kind_at(
            position: usize,
        ) -> Option<(TypeId, &'static str)>;

        #[doc(hidden)]
        fn lookup<F: Family, U: 'static>(
            repr: &Self::Repr<F>,
            position: usize,
        ) -> &F::Of<U>;

        #[doc(hidden)]
        fn lookup_mut<F: Family, U: 'static>(
            repr: &mut Self::Repr<F>,
            position: usize,
        ) -> &mut F::Of<U>;
    }

    impl Context for EmptyCtx {
        const SIZE: usize = 0;

        type Repr<F: Family> = ();

        fn known_size() -> Size<Self> {
            zero_size()
        }

        fn kind_at(
            _position: usize,
        ) -> Option<(TypeId, &'static str)> {
            None
        }

        fn lookup<F: Family, U: 'static>(
            _repr: &Self::Repr<F>,
            position: usize,
        ) -> &F::Of<U> {
            unreachable!(
                "position {position} is not a slot of the empty context"
            )
        }

        fn lookup_mut<F: Family, U: 'static>(
            _repr: &mut Self::Repr<F>,
            position: usize,
        ) -> &mut F::Of<U> {
            unreachable!(
                "position {position} is not a slot of the empty context"
            )
        }
    }

    impl<C: Context, T: 'static> Context for Snoc<C, T> {
        const SIZE: usize = C::SIZE + 1;

        type Repr<F: Family> = (C::Repr<F>, F::Of<T>);

        fn known_size() -> Size<Self> {
            inc_size(C::known_size())
        }

        fn kind_at(
            position: usize,
        ) -> Option<(TypeId, &'static str)> {
            if position == C::SIZE {
                Some((TypeId::of::<T>(), type_name::<T>()))
            } else {
                C::kind_at(position)
            }
        }

        fn lookup<F: Family, U: 'static>(
            repr: &Self::Repr<F>,
            position: usize,
        ) -> &F::Of<U> {
            if position == C::SIZE {
                // Upholds `same_kind`: only an `Index<Self, U>`
                // asks for this position.
                let same = unsafe { same_kind::<T, U>() };
                same.lift::<F>().coerce_ref(&repr.1)
            } else {
                C::lookup::<F, U>(&repr.0, position)
            }
        }

        fn lookup_mut<F: Family, U: 'static>(
            repr: &mut Self::Repr<F>,
            position: usize,
        ) -> &mut F::Of<U> {
            if position == C::SIZE {
                let same = unsafe { same_kind::<T, U>() };
                same.lift::<F>().coerce_mut(&mut repr.1)
            } else {
                C::lookup_mut::<F, U>(&mut repr.0, position)
            }
        }
    }

    /// Assumes the kind at a looked-up position
    /// is the kind its index claims.
    ///
    /// # Safety
    ///
    /// Only an `Index<C, U>` reaches this,
    /// and it may only exist if slot `position` of `C`
    /// has kind `U`, so `T` is `U`.
    ///
    unsafe fn same_kind<T: 'static, U: 'static>(
    ) -> Prf<Same<T, U>> {
        if cfg!(feature = "checked-kinds") {
            assert_eq!(
                TypeId::of::<T>(),
                TypeId::of::<U>(),
                "index claims `{}` for a slot of `{}`",
                type_name::<U>(),
                type_name::<T>(),
            );
        } else {
            debug_assert_eq!(
                TypeId::of::<T>(),
                TypeId::of::<U>(),
                "index claims `{}` for a slot of `{}`",
                type_name::<U>(),
                type_name::<T>(),
            );
        }
        unsafe { assume::<Same<T, U>>() }
    }
}

pub mod size {

    //! Witnesses for the length of a context.
    //!
    //! Conceptually a `Size` is unary:
    //! zero, or one more than a smaller size.
    //! It stores the count of those steps.

    use super::ctx::{Context, EmptyCtx, Snoc};
    use core::fmt;
    use core::marker::PhantomData;

    /// Proof that context `C` has `size_int(size)` slots.
    pub struct Size<C> {
        len: usize,
        ctx: PhantomData<fn(C) -> C>,
    }

    impl<C> Size<C> {
        pub(crate) const fn trusted(len: usize) -> Self {
            Size {
                len,
                ctx: PhantomData,
            }
        }
    }

    impl<C> Clone for Size<C> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<C> Copy for Size<C> {}

    impl<C> PartialEq for Size<C> {
        fn eq(&self, other: &Self) -> bool {
            self.len == other.len
        }
    }

    impl<C> Eq for Size<C> {}

    impl<C> fmt::Debug for Size<C> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("Size").field(&self.len).finish()
        }
    }

    /// Size of the empty context.
    pub const fn zero_size() -> Size<EmptyCtx> {
        Size::trusted(0)
    }

    /// Size of a context with one more slot.
    pub const fn inc_size<C, T>(
        size: Size<C>,
    ) -> Size<Snoc<C, T>> {
        Size::trusted(size.len + 1)
    }

    /// Number of slots.
    pub const fn size_int<C>(size: Size<C>) -> usize {
        size.len
    }

    /// Size of a context known from its type.
    pub fn known_size<C: Context>() -> Size<C> {
        C::known_size()
    }
}

pub mod diff {

    //! Witnesses that one context extends another.

    use super::ctx::Snoc;
    use super::size::{size_int, Size};
    use core::fmt;
    use core::marker::PhantomData;

    /// Proof that `R` is `L` with `appended()` slots
    /// appended at the end.
    ///
    /// Diffs form a category:
    /// [`no_diff`] is the identity
    /// and [`Diff::compose`] is associative.
    pub struct Diff<L, R> {
        appended: usize,
        ctx: PhantomData<fn(L, R) -> (L, R)>,
    }

    impl<L, R> Clone for Diff<L, R> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<L, R> Copy for Diff<L, R> {}

    impl<L, R> PartialEq for Diff<L, R> {
        fn eq(&self, other: &Self) -> bool {
            self.appended == other.appended
        }
    }

    impl<L, R> Eq for Diff<L, R> {}

    impl<L, R> fmt::Debug for Diff<L, R> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("Diff").field(&self.appended).finish()
        }
    }

    /// Nothing appended.
    pub const fn no_diff<L>() -> Diff<L, L> {
        Diff {
            appended: 0,
            ctx: PhantomData,
        }
    }

    impl<L, R> Diff<L, R> {
        /// One more slot, of kind `T`, appended on the right.
        pub const fn extend_right<T>(self) -> Diff<L, Snoc<R, T>> {
            Diff {
                appended: self.appended + 1,
                ctx: PhantomData,
            }
        }

        /// First `self`, then `next`.
        pub const fn compose<S>(self, next: Diff<R, S>) -> Diff<L, S> {
            Diff {
                appended: self.appended + next.appended,
                ctx: PhantomData,
            }
        }

        /// How many slots `R` has beyond `L`.
        pub const fn appended(&self) -> usize {
            self.appended
        }
    }

    /// The size of the extended context.
    pub const fn ext_size<L, R>(
        size: Size<L>,
        diff: Diff<L, R>,
    ) -> Size<R> {
        Size::trusted(size_int(size) + diff.appended)
    }

    /// Path to `L` inside `R`: `R` is `L`.
    pub enum Here {}

    /// Path to `L` inside `R`: `L` is inside the init of `R`,
    /// along path `I`.
    pub struct There<I>(PhantomData<fn(I) -> I>);

    /// Contexts statically known to extend `L`.
    ///
    /// The path `I` keeps the two cases apart,
    /// and is always inferred.
    pub trait KnownDiff<L, I>: Sized {
        /// The diff from `L` to `Self`.
        fn known_diff() -> Diff<L, Self>;
    }

    impl<L> KnownDiff<L, Here> for L {
        fn known_diff() -> Diff<L, L> {
            no_diff()
        }
    }

    impl<L, R, T, I> KnownDiff<L, There<I>> for Snoc<R, T>
    where
        R: KnownDiff<L, I>,
    {
        fn known_diff() -> Diff<L, Snoc<R, T>> {
            R::known_diff().extend_right()
        }
    }

    /// The diff from `L` to `R`, inferred from their types.
    pub fn known_diff<L, R, I>() -> Diff<L, R>
    where
        R: KnownDiff<L, I>,
    {
        R::known_diff()
    }
}

pub mod index {

    //! Positions known to hold a slot of a given kind.

    use super::ctx::{Context, EmptyCtx, Snoc};
    use super::diff::{no_diff, Diff, KnownDiff};
    use super::proof::{assume, Prf, Same};
    use super::size::{size_int, Size};
    use core::any::TypeId;
    use core::cmp::Ordering;
    use core::fmt;
    use core::hash::{Hash, Hasher};
    use core::marker::PhantomData;

    /// A position in `C` that is known to hold a `T`.
    ///
    /// Positions count from the first slot,
    /// so extending the context never moves an index.
    ///
    /// An index never changes its claim,
    /// not even to a kind its own kind is a subtype of:
    ///
    /// ```compile_fail
    /// use tyctx::ctx;
    /// use tyctx::index::{base, Index};
    ///
    /// type General = for<'a> fn(&'a u8) -> u8;
    /// type Narrow = fn(&'static u8) -> u8;
    ///
    /// let index: Index<ctx![General], Narrow> = base::<General>();
    /// ```
    ///
    pub struct Index<C, T> {
        position: usize,
        ctx: PhantomData<fn(C, T) -> (C, T)>,
    }

    impl<C, T> Index<C, T> {
        /// Say that a position holds a `T` in `C`.
        ///
        /// This is the trusted fast path:
        /// nothing is checked here,
        /// and lookups only re-check the kind in debug builds.
        ///
        /// # Safety
        ///
        /// Slot `position` of `C` must exist
        /// and have kind `T`.
        ///
        pub const unsafe fn new_unchecked(position: usize) -> Self {
            Index {
                position,
                ctx: PhantomData,
            }
        }

        /// Get the position of an index,
        /// with 0 for the first slot.
        pub const fn index(&self) -> usize {
            self.position
        }

        /// The same slot, in `C` with one more slot appended.
        pub const fn skip<U>(self) -> Index<Snoc<C, U>, T> {
            unsafe { Index::new_unchecked(self.position) }
        }

        /// The same slot, in any extension of `C`.
        pub fn extend<R>(
            self,
            _diff: Diff<C, R>,
        ) -> Index<R, T> {
            unsafe { Index::new_unchecked(self.position) }
        }

        /// Like [`Self::extend`],
        /// with the extension inferred from the types.
        pub fn extend_known<R, I>(self) -> Index<R, T>
        where
            R: KnownDiff<C, I>,
        {
            self.extend(R::known_diff())
        }

        /// Proof that two indices into the same context
        /// have the same kind, if they are the same slot.
        pub fn test_equality<U>(
            &self,
            other: &Index<C, U>,
        ) -> Option<Prf<Same<T, U>>>
        where
            T: 'static,
            U: 'static,
        {
            if self.position != other.position {
                return None;
            }
            debug_assert_eq!(TypeId::of::<T>(), TypeId::of::<U>());
            Some(unsafe { assume::<Same<T, U>>() })
        }
    }

    impl<C, T> Clone for Index<C, T> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<C, T> Copy for Index<C, T> {}

    impl<C, T, U> PartialEq<Index<C, U>> for Index<C, T> {
        fn eq(&self, other: &Index<C, U>) -> bool {
            self.position == other.position
        }
    }

    impl<C, T> Eq for Index<C, T> {}

    impl<C, T, U> PartialOrd<Index<C, U>> for Index<C, T> {
        fn partial_cmp(
            &self,
            other: &Index<C, U>,
        ) -> Option<Ordering> {
            Some(self.position.cmp(&other.position))
        }
    }

    impl<C, T> Ord for Index<C, T> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.position.cmp(&other.position)
        }
    }

    impl<C, T> Hash for Index<C, T> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.position.hash(state)
        }
    }

    impl<C, T> fmt::Debug for Index<C, T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("Index").field(&self.position).finish()
        }
    }

    /// The only slot of a one-slot context.
    pub const fn base<T>() -> Index<Snoc<EmptyCtx, T>, T> {
        unsafe { Index::new_unchecked(0) }
    }

    /// The slot about to be appended to a context of `size`.
    pub const fn next_index<C, T>(
        size: Size<C>,
    ) -> Index<Snoc<C, T>, T> {
        unsafe { Index::new_unchecked(size_int(size)) }
    }

    /// The last slot of a non-empty context.
    pub const fn last_index<C, T>(
        size: Size<Snoc<C, T>>,
    ) -> Index<Snoc<C, T>, T> {
        // A `Snoc` has at least one slot.
        unsafe { Index::new_unchecked(size_int(size) - 1) }
    }

    /// An index into `C` whose kind is hidden.
    ///
    /// Use [`SomeIndex::with_index`] to get at the typed index,
    /// or [`SomeIndex::downcast`] if you expect a kind.
    pub struct SomeIndex<C> {
        position: usize,
        ctx: PhantomData<fn(C) -> C>,
    }

    impl<C> SomeIndex<C> {
        /// Get the position of an index.
        pub const fn index(&self) -> usize {
            self.position
        }
    }

    impl<C: Context> SomeIndex<C> {
        /// Applies a kind-polymorphic continuation
        /// to the typed index.
        pub fn with_index<W, R>(self, cont: W) -> R
        where
            C: Dispatch<C, W, R>,
        {
            C::dispatch(self.position, no_diff(), cont)
        }

        /// The typed index, if the slot has kind `T`.
        pub fn downcast<T: 'static>(self) -> Option<Index<C, T>> {
            match C::kind_at(self.position) {
                Some((kind, _)) if kind == TypeId::of::<T>() => {
                    Some(unsafe {
                        Index::new_unchecked(self.position)
                    })
                }
                _ => None,
            }
        }

        /// Name of the slot’s kind, for diagnostics.
        pub fn kind_name(&self) -> &'static str {
            match C::kind_at(self.position) {
                Some((_, name)) => name,
                None => unreachable!(
                    "position {} is not a slot of this context",
                    self.position
                ),
            }
        }
    }

    impl<C, T> From<Index<C, T>> for SomeIndex<C> {
        fn from(index: Index<C, T>) -> Self {
            SomeIndex {
                position: index.position,
                ctx: PhantomData,
            }
        }
    }

    impl<C> Clone for SomeIndex<C> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<C> Copy for SomeIndex<C> {}

    impl<C> PartialEq for SomeIndex<C> {
        fn eq(&self, other: &Self) -> bool {
            self.position == other.position
        }
    }

    impl<C> Eq for SomeIndex<C> {}

    impl<C> PartialOrd for SomeIndex<C> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl<C> Ord for SomeIndex<C> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.position.cmp(&other.position)
        }
    }

    impl<C> Hash for SomeIndex<C> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.position.hash(state)
        }
    }

    impl<C> fmt::Debug for SomeIndex<C> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("SomeIndex").field(&self.position).finish()
        }
    }

    /// Every index of a context of `size`, in ascending order.
    pub fn index_list<C: Context>(
        size: Size<C>,
    ) -> Vec<SomeIndex<C>> {
        (0..size_int(size))
            .map(|position| SomeIndex {
                position,
                ctx: PhantomData,
            })
            .collect()
    }

    /// The index at `position`,
    /// or `None` if it’s not less than `size`.
    pub fn int_index<C: Context>(
        position: usize,
        size: Size<C>,
    ) -> Option<SomeIndex<C>> {
        (position < size_int(size)).then_some(SomeIndex {
            position,
            ctx: PhantomData,
        })
    }

    /// One step of [`for_index`], at every kind `T`.
    pub trait IndexFold<C, T, A> {
        /// Combines the accumulator with the next index.
        fn step(&mut self, acc: A, index: Index<C, T>) -> A;
    }

    /// Contexts whose every index can be folded by `M`.
    ///
    /// `Self` is a prefix of `Full`;
    /// `diff` carries its indices over to `Full`.
    pub trait ForIndex<Full, A, M>: Context {
        /// Folds the indices of this prefix, first to last.
        fn for_index_from(
            diff: Diff<Self, Full>,
            acc: A,
            step: &mut M,
        ) -> A;
    }

    impl<Full, A, M> ForIndex<Full, A, M> for EmptyCtx {
        fn for_index_from(
            _diff: Diff<Self, Full>,
            acc: A,
            _step: &mut M,
        ) -> A {
            acc
        }
    }

    impl<Full, A, M, C, T> ForIndex<Full, A, M> for Snoc<C, T>
    where
        C: ForIndex<Full, A, M>,
        T: 'static,
        M: IndexFold<Full, T, A>,
    {
        fn for_index_from(
            diff: Diff<Self, Full>,
            acc: A,
            step: &mut M,
        ) -> A {
            let init = no_diff::<C>().extend_right::<T>();
            let acc = C::for_index_from(init.compose(diff), acc, step);
            let last = next_index::<C, T>(C::known_size());
            step.step(acc, last.extend(diff))
        }
    }

    /// Folds `step` over every index of a context of `size`,
    /// in ascending order.
    pub fn for_index<C, A, M>(size: Size<C>, init: A, mut step: M) -> A
    where
        C: ForIndex<C, A, M>,
    {
        debug_assert_eq!(size_int(size), C::SIZE);
        C::for_index_from(no_diff(), init, &mut step)
    }

    /// A continuation taking an index of any kind.
    pub trait IndexCont<C, T> {
        /// What every kind’s continuation returns.
        type Output;

        /// Continues with the typed index.
        fn call(self, index: Index<C, T>) -> Self::Output;
    }

    /// Contexts that can recover the kind at a position
    /// for a continuation `W` returning `R`.
    pub trait Dispatch<Full, W, R>: Context {
        /// Calls `cont` with the index at `position`.
        fn dispatch(
            position: usize,
            diff: Diff<Self, Full>,
            cont: W,
        ) -> R;
    }

    impl<Full, W, R> Dispatch<Full, W, R> for EmptyCtx {
        fn dispatch(
            position: usize,
            _diff: Diff<Self, Full>,
            _cont: W,
        ) -> R {
            unreachable!(
                "position {position} is not a slot of this context"
            )
        }
    }

    impl<Full, W, R, C, T> Dispatch<Full, W, R> for Snoc<C, T>
    where
        C: Dispatch<Full, W, R>,
        T: 'static,
        W: IndexCont<Full, T, Output = R>,
    {
        fn dispatch(
            position: usize,
            diff: Diff<Self, Full>,
            cont: W,
        ) -> R {
            if position == C::SIZE {
                let last = next_index::<C, T>(C::known_size());
                cont.call(last.extend(diff))
            } else {
                let init = no_diff::<C>().extend_right::<T>();
                C::dispatch(position, init.compose(diff), cont)
            }
        }
    }
}

pub mod poly {

    //! Functions defined at every kind.
    //!
    //! A Rust closure has one argument type,
    //! but a context has many kinds.
    //! So operations that apply a function at every slot
    //! take a value implementing one of these traits
    //! at every kind of the context:
    //! implement it per kind,
    //! or once as a blanket impl over the kinds you support.
    //!
    //! The adapters at the bottom let the fallible recursions
    //! also run the infallible functions.

    use super::index::Index;
    use super::kind::{Const, Family, IndexOf};
    use core::convert::Infallible;
    use core::fmt;

    /// Makes the value of a slot from its index.
    pub trait GenerateFn<C, F: Family, T> {
        /// Makes the value at `index`.
        fn generate(&mut self, index: Index<C, T>) -> F::Of<T>;
    }

    /// Like [`GenerateFn`], but may fail.
    pub trait TryGenerateFn<C, F: Family, T, E> {
        /// Makes the value at `index`, or fails.
        fn try_generate(
            &mut self,
            index: Index<C, T>,
        ) -> Result<F::Of<T>, E>;
    }

    /// Changes the family of a slot’s value.
    pub trait MapFn<F: Family, G: Family, T> {
        /// Maps one value.
        fn map(&mut self, value: &F::Of<T>) -> G::Of<T>;
    }

    /// Like [`MapFn`], but may fail.
    pub trait TryMapFn<F: Family, G: Family, T, E> {
        /// Maps one value, or fails.
        fn try_map(&mut self, value: &F::Of<T>) -> Result<G::Of<T>, E>;
    }

    /// Like [`TryMapFn`], and also sees the index.
    pub trait TraverseFn<C, F: Family, G: Family, T, E> {
        /// Maps the value at `index`, or fails.
        fn traverse(
            &mut self,
            index: Index<C, T>,
            value: &F::Of<T>,
        ) -> Result<G::Of<T>, E>;
    }

    /// Combines two slots of the same kind.
    pub trait ZipFn<F: Family, G: Family, H: Family, T> {
        /// Combines one pair.
        fn zip(&mut self, left: &F::Of<T>, right: &G::Of<T>) -> H::Of<T>;
    }

    /// Like [`ZipFn`], but may fail.
    pub trait TryZipFn<F: Family, G: Family, H: Family, T, E> {
        /// Combines one pair, or fails.
        fn try_zip(
            &mut self,
            left: &F::Of<T>,
            right: &G::Of<T>,
        ) -> Result<H::Of<T>, E>;
    }

    /// One step of a left fold over an assignment.
    pub trait FoldFn<C, F: Family, T, A> {
        /// Combines the accumulator with the next slot.
        fn fold(&mut self, acc: A, index: Index<C, T>, value: &F::Of<T>) -> A;
    }

    /// Runs a [`GenerateFn`] where a [`TryGenerateFn`] is expected.
    pub struct Infallibly<M>(pub(crate) M);

    impl<C, F, T, M> TryGenerateFn<C, F, T, Infallible> for Infallibly<M>
    where
        F: Family,
        M: GenerateFn<C, F, T>,
    {
        fn try_generate(
            &mut self,
            index: Index<C, T>,
        ) -> Result<F::Of<T>, Infallible> {
            Ok(self.0.generate(index))
        }
    }

    /// Runs a [`MapFn`] where a [`TraverseFn`] is expected.
    pub struct Mapping<M>(pub(crate) M);

    impl<C, F, G, T, M> TraverseFn<C, F, G, T, Infallible> for Mapping<M>
    where
        F: Family,
        G: Family,
        M: MapFn<F, G, T>,
    {
        fn traverse(
            &mut self,
            _index: Index<C, T>,
            value: &F::Of<T>,
        ) -> Result<G::Of<T>, Infallible> {
            Ok(self.0.map(value))
        }
    }

    /// Runs a [`TryMapFn`] where a [`TraverseFn`] is expected.
    pub struct TryMapping<M>(pub(crate) M);

    impl<C, F, G, T, E, M> TraverseFn<C, F, G, T, E> for TryMapping<M>
    where
        F: Family,
        G: Family,
        M: TryMapFn<F, G, T, E>,
    {
        fn traverse(
            &mut self,
            _index: Index<C, T>,
            value: &F::Of<T>,
        ) -> Result<G::Of<T>, E> {
            self.0.try_map(value)
        }
    }

    /// Runs a [`ZipFn`] where a [`TryZipFn`] is expected.
    pub struct Zipping<M>(pub(crate) M);

    impl<F, G, H, T, M> TryZipFn<F, G, H, T, Infallible> for Zipping<M>
    where
        F: Family,
        G: Family,
        H: Family,
        M: ZipFn<F, G, H, T>,
    {
        fn try_zip(
            &mut self,
            left: &F::Of<T>,
            right: &G::Of<T>,
        ) -> Result<H::Of<T>, Infallible> {
            Ok(self.0.zip(left, right))
        }
    }

    /// Folds a [`MapFn`] into a list of its uniform results.
    pub struct Collect<M>(pub(crate) M);

    impl<C, F, T, R, M> FoldFn<C, F, T, Vec<R>> for Collect<M>
    where
        F: Family,
        M: MapFn<F, Const<R>, T>,
    {
        fn fold(
            &mut self,
            mut acc: Vec<R>,
            _index: Index<C, T>,
            value: &F::Of<T>,
        ) -> Vec<R> {
            acc.push(self.0.map(value));
            acc
        }
    }

    /// Every slot gets a clone of one value.
    pub struct Replicate<R>(pub(crate) R);

    impl<C, T, R: Clone> GenerateFn<C, Const<R>, T> for Replicate<R> {
        fn generate(&mut self, _index: Index<C, T>) -> R {
            self.0.clone()
        }
    }

    /// Every slot gets its own index.
    pub struct Indices;

    impl<C, T> GenerateFn<C, IndexOf<C>, T> for Indices {
        fn generate(&mut self, index: Index<C, T>) -> Index<C, T> {
            index
        }
    }

    /// Clones each value, keeping the family.
    pub struct CloneSlot;

    impl<F, T> MapFn<F, F, T> for CloneSlot
    where
        F: Family,
        F::Of<T>: Clone,
    {
        fn map(&mut self, value: &F::Of<T>) -> F::Of<T> {
            value.clone()
        }
    }

    /// Renders each value with [`fmt::Debug`].
    pub struct DebugSlot;

    impl<F, T> MapFn<F, Const<String>, T> for DebugSlot
    where
        F: Family,
        F::Of<T>: fmt::Debug,
    {
        fn map(&mut self, value: &F::Of<T>) -> String {
            format!("{value:?}")
        }
    }

    /// Renders each value with [`fmt::Display`].
    pub struct DisplaySlot;

    impl<F, T> MapFn<F, Const<String>, T> for DisplaySlot
    where
        F: Family,
        F::Of<T>: fmt::Display,
    {
        fn map(&mut self, value: &F::Of<T>) -> String {
            format!("{value}")
        }
    }
}

pub mod assignment {

    //! Assignments: one value per slot of a context.

    use super::ctx::{Context, EmptyCtx, Snoc};
    use super::diff::{no_diff, Diff};
    use super::index::{next_index, Index};
    use super::kind::{Const, Family, Id, IndexOf};
    use super::poly::{
        Collect, DebugSlot, DisplaySlot, FoldFn, Indices,
        Infallibly, Mapping, Replicate, TraverseFn,
        TryGenerateFn, TryMapping, TryZipFn, Zipping,
    };
    use super::size::{size_int, Size};
    use core::cmp::Ordering;
    use core::convert::Infallible;
    use core::fmt;
    use core::hash::{Hash, Hasher};
    use core::ops;

    /// A value of `F::Of<T>` for each slot `T` of `C`.
    ///
    /// Built by [`Assignment::empty`] and [`Assignment::extend`],
    /// or in bulk by [`Assignment::generate`].
    /// The shape never changes after that:
    /// [`Assignment::update`] and [`Assignment::adjust`]
    /// only change a slot’s contents.
    pub struct Assignment<C: Context, F: Family = Id> {
        repr: C::Repr<F>,
    }

    impl<F: Family> Assignment<EmptyCtx, F> {
        /// The assignment with no slots.
        pub fn empty() -> Self {
            Assignment { repr: () }
        }
    }

    impl<F: Family> Default for Assignment<EmptyCtx, F> {
        fn default() -> Self {
            Assignment::empty()
        }
    }

    impl<C: Context, F: Family> Assignment<C, F> {
        /// Appends one more slot.
        pub fn extend<T: 'static>(
            self,
            value: F::Of<T>,
        ) -> Assignment<Snoc<C, T>, F> {
            Assignment {
                repr: (self.repr, value),
            }
        }

        /// Witness for the number of slots.
        pub fn size(&self) -> Size<C> {
            C::known_size()
        }

        /// Whether there are no slots.
        pub fn is_null(&self) -> bool {
            C::SIZE == 0
        }

        /// The value at `index`, **check-free**.
        pub fn get<T: 'static>(&self, index: Index<C, T>) -> &F::Of<T> {
            C::lookup::<F, T>(&self.repr, index.index())
        }

        /// The value at `index`, mutably, **check-free**.
        pub fn get_mut<T: 'static>(
            &mut self,
            index: Index<C, T>,
        ) -> &mut F::Of<T> {
            C::lookup_mut::<F, T>(&mut self.repr, index.index())
        }

        /// Replaces the value at `index`.
        pub fn update<T: 'static>(
            mut self,
            index: Index<C, T>,
            value: F::Of<T>,
        ) -> Self {
            *self.get_mut(index) = value;
            self
        }

        /// Replaces the value at `index` with `f` of it.
        pub fn adjust<T: 'static>(
            mut self,
            index: Index<C, T>,
            f: impl FnOnce(&F::Of<T>) -> F::Of<T>,
        ) -> Self {
            let slot = self.get_mut(index);
            let value = f(slot);
            *slot = value;
            self
        }

        /// Slot `i` holds `make` of index `i`.
        ///
        /// `make` is called once per slot, first to last.
        pub fn generate<M>(size: Size<C>, make: M) -> Self
        where
            C: Generate<C, F, Infallibly<M>, Infallible>,
        {
            let made =
                Self::try_generate::<Infallible, _>(size, Infallibly(make));
            match made {
                Ok(assignment) => assignment,
                Err(never) => match never {},
            }
        }

        /// Like [`Self::generate`], but stops at the first failure.
        pub fn try_generate<E, M>(
            size: Size<C>,
            mut make: M,
        ) -> Result<Self, E>
        where
            C: Generate<C, F, M, E>,
        {
            debug_assert_eq!(size_int(size), C::SIZE);
            let repr = C::generate_repr(no_diff(), &mut make)?;
            Ok(Assignment { repr })
        }

        /// Maps every slot into another family.
        pub fn map<G, M>(&self, f: M) -> Assignment<C, G>
        where
            G: Family,
            C: Traverse<C, F, G, Mapping<M>, Infallible>,
        {
            let mapped =
                self.traverse_with_index::<G, Infallible, _>(Mapping(f));
            match mapped {
                Ok(assignment) => assignment,
                Err(never) => match never {},
            }
        }

        /// Maps every slot, first to last,
        /// and stops at the first failure.
        pub fn traverse<G, E, M>(
            &self,
            f: M,
        ) -> Result<Assignment<C, G>, E>
        where
            G: Family,
            C: Traverse<C, F, G, TryMapping<M>, E>,
        {
            self.traverse_with_index(TryMapping(f))
        }

        /// Like [`Self::traverse`], and `f` also sees each index.
        pub fn traverse_with_index<G, E, M>(
            &self,
            mut f: M,
        ) -> Result<Assignment<C, G>, E>
        where
            G: Family,
            C: Traverse<C, F, G, M, E>,
        {
            let repr = C::traverse_repr(no_diff(), &self.repr, &mut f)?;
            Ok(Assignment { repr })
        }

        /// Combines two assignments of the same shape slot by slot.
        pub fn zip_with<G, H, M>(
            &self,
            other: &Assignment<C, G>,
            f: M,
        ) -> Assignment<C, H>
        where
            G: Family,
            H: Family,
            C: ZipWith<F, G, H, Zipping<M>, Infallible>,
        {
            let zipped = self
                .try_zip_with::<G, H, Infallible, _>(other, Zipping(f));
            match zipped {
                Ok(assignment) => assignment,
                Err(never) => match never {},
            }
        }

        /// Like [`Self::zip_with`], but stops at the first failure.
        pub fn try_zip_with<G, H, E, M>(
            &self,
            other: &Assignment<C, G>,
            mut f: M,
        ) -> Result<Assignment<C, H>, E>
        where
            G: Family,
            H: Family,
            C: ZipWith<F, G, H, M, E>,
        {
            let repr = C::zip_repr(&self.repr, &other.repr, &mut f)?;
            Ok(Assignment { repr })
        }

        /// Left fold over the slots, first to last.
        pub fn fold<A, M>(&self, init: A, mut f: M) -> A
        where
            C: Fold<C, F, M, A>,
        {
            C::fold_repr(no_diff(), &self.repr, init, &mut f)
        }

        /// The uniform results of `f` at every slot, first to last.
        pub fn to_list<R, M>(&self, f: M) -> Vec<R>
        where
            C: Fold<C, F, Collect<M>, Vec<R>>,
        {
            self.fold(Vec::with_capacity(C::SIZE), Collect(f))
        }
    } // impl Assignment

    impl<C: Context, T: 'static, F: Family> Assignment<Snoc<C, T>, F> {
        /// Drops the last slot.
        pub fn init(self) -> Assignment<C, F> {
            self.split_last().0
        }

        /// The value in the last slot.
        pub fn last(&self) -> &F::Of<T> {
            &self.repr.1
        }

        /// The assignment without its last slot,
        /// and the value that was there.
        pub fn split_last(self) -> (Assignment<C, F>, F::Of<T>) {
            let (init, last) = self.repr;
            (Assignment { repr: init }, last)
        }
    } // impl Assignment

    impl<C: Context, R: Clone> Assignment<C, Const<R>> {
        /// Every slot holds a clone of `value`.
        pub fn replicate(size: Size<C>, value: R) -> Self
        where
            C: Generate<C, Const<R>, Infallibly<Replicate<R>>, Infallible>,
        {
            Assignment::generate(size, Replicate(value))
        }
    }

    impl<C: Context> Assignment<C, IndexOf<C>> {
        /// Every slot holds its own index.
        pub fn indices(size: Size<C>) -> Self
        where
            C: Generate<C, IndexOf<C>, Infallibly<Indices>, Infallible>,
        {
            Assignment::generate(size, Indices)
        }
    }

    /// Contexts that `M` can generate every slot of.
    ///
    /// `Self` is a prefix of `Full`;
    /// `diff` carries its indices over to `Full`.
    pub trait Generate<Full, F: Family, M, E>: Context {
        /// Generates this prefix, first slot first.
        fn generate_repr(
            diff: Diff<Self, Full>,
            make: &mut M,
        ) -> Result<Self::Repr<F>, E>;
    }

    impl<Full, F: Family, M, E> Generate<Full, F, M, E> for EmptyCtx {
        fn generate_repr(
            _diff: Diff<Self, Full>,
            _make: &mut M,
        ) -> Result<Self::Repr<F>, E> {
            Ok(())
        }
    }

    impl<Full, F, M, E, C, T> Generate<Full, F, M, E> for Snoc<C, T>
    where
        F: Family,
        C: Generate<Full, F, M, E>,
        T: 'static,
        M: TryGenerateFn<Full, F, T, E>,
    {
        fn generate_repr(
            diff: Diff<Self, Full>,
            make: &mut M,
        ) -> Result<Self::Repr<F>, E> {
            let prefix = no_diff::<C>().extend_right::<T>();
            let init = C::generate_repr(prefix.compose(diff), make)?;
            let index = next_index::<C, T>(C::known_size());
            let last = make.try_generate(index.extend(diff))?;
            Ok((init, last))
        }
    }

    /// Contexts that `M` can traverse every slot of.
    pub trait Traverse<Full, F: Family, G: Family, M, E>: Context {
        /// Traverses this prefix, first slot first.
        fn traverse_repr(
            diff: Diff<Self, Full>,
            repr: &Self::Repr<F>,
            f: &mut M,
        ) -> Result<Self::Repr<G>, E>;
    }

    impl<Full, F, G, M, E> Traverse<Full, F, G, M, E> for EmptyCtx
    where
        F: Family,
        G: Family,
    {
        fn traverse_repr(
            _diff: Diff<Self, Full>,
            _repr: &Self::Repr<F>,
            _f: &mut M,
        ) -> Result<Self::Repr<G>, E> {
            Ok(())
        }
    }

    impl<Full, F, G, M, E, C, T> Traverse<Full, F, G, M, E>
        for Snoc<C, T>
    where
        F: Family,
        G: Family,
        C: Traverse<Full, F, G, M, E>,
        T: 'static,
        M: TraverseFn<Full, F, G, T, E>,
    {
        fn traverse_repr(
            diff: Diff<Self, Full>,
            repr: &Self::Repr<F>,
            f: &mut M,
        ) -> Result<Self::Repr<G>, E> {
            let prefix = no_diff::<C>().extend_right::<T>();
            let init =
                C::traverse_repr(prefix.compose(diff), &repr.0, f)?;
            let index = next_index::<C, T>(C::known_size());
            let last = f.traverse(index.extend(diff), &repr.1)?;
            Ok((init, last))
        }
    }

    /// Contexts that `M` can zip every slot of.
    pub trait ZipWith<F: Family, G: Family, H: Family, M, E>:
        Context
    {
        /// Zips this prefix, first slot first.
        fn zip_repr(
            left: &Self::Repr<F>,
            right: &Self::Repr<G>,
            f: &mut M,
        ) -> Result<Self::Repr<H>, E>;
    }

    impl<F, G, H, M, E> ZipWith<F, G, H, M, E> for EmptyCtx
    where
        F: Family,
        G: Family,
        H: Family,
    {
        fn zip_repr(
            _left: &Self::Repr<F>,
            _right: &Self::Repr<G>,
            _f: &mut M,
        ) -> Result<Self::Repr<H>, E> {
            Ok(())
        }
    }

    impl<F, G, H, M, E, C, T> ZipWith<F, G, H, M, E> for Snoc<C, T>
    where
        F: Family,
        G: Family,
        H: Family,
        C: ZipWith<F, G, H, M, E>,
        T: 'static,
        M: TryZipFn<F, G, H, T, E>,
    {
        fn zip_repr(
            left: &Self::Repr<F>,
            right: &Self::Repr<G>,
            f: &mut M,
        ) -> Result<Self::Repr<H>, E> {
            let init = C::zip_repr(&left.0, &right.0, f)?;
            let last = f.try_zip(&left.1, &right.1)?;
            Ok((init, last))
        }
    }

    /// Contexts that `M` can fold every slot of.
    pub trait Fold<Full, F: Family, M, A>: Context {
        /// Folds this prefix, first slot first.
        fn fold_repr(
            diff: Diff<Self, Full>,
            repr: &Self::Repr<F>,
            acc: A,
            f: &mut M,
        ) -> A;
    }

    impl<Full, F: Family, M, A> Fold<Full, F, M, A> for EmptyCtx {
        fn fold_repr(
            _diff: Diff<Self, Full>,
            _repr: &Self::Repr<F>,
            acc: A,
            _f: &mut M,
        ) -> A {
            acc
        }
    }

    impl<Full, F, M, A, C, T> Fold<Full, F, M, A> for Snoc<C, T>
    where
        F: Family,
        C: Fold<Full, F, M, A>,
        T: 'static,
        M: FoldFn<Full, F, T, A>,
    {
        fn fold_repr(
            diff: Diff<Self, Full>,
            repr: &Self::Repr<F>,
            acc: A,
            f: &mut M,
        ) -> A {
            let prefix = no_diff::<C>().extend_right::<T>();
            let acc =
                C::fold_repr(prefix.compose(diff), &repr.0, acc, f);
            let index = next_index::<C, T>(C::known_size());
            f.fold(acc, index.extend(diff), &repr.1)
        }
    }

    impl<C: Context, F: Family, T: 'static> ops::Index<Index<C, T>>
        for Assignment<C, F>
    {
        type Output = F::Of<T>;
        fn index(&self, index: Index<C, T>) -> &F::Of<T> {
            self.get(index)
        }
    }

    impl<C: Context, F: Family, T: 'static> ops::IndexMut<Index<C, T>>
        for Assignment<C, F>
    {
        fn index_mut(&mut self, index: Index<C, T>) -> &mut F::Of<T> {
            self.get_mut(index)
        }
    }

    impl<C: Context, F: Family> Clone for Assignment<C, F>
    where
        C::Repr<F>: Clone,
    {
        fn clone(&self) -> Self {
            Assignment {
                repr: self.repr.clone(),
            }
        }
    }

    impl<C: Context, F: Family> Copy for Assignment<C, F> where
        C::Repr<F>: Copy
    {
    }

    /// Equal when every pair of slots is equal.
    impl<C: Context, F: Family> PartialEq for Assignment<C, F>
    where
        C::Repr<F>: PartialEq,
    {
        fn eq(&self, other: &Self) -> bool {
            self.repr == other.repr
        }
    }

    impl<C: Context, F: Family> Eq for Assignment<C, F> where
        C::Repr<F>: Eq
    {
    }

    /// Lexicographic, first slot first.
    impl<C: Context, F: Family> PartialOrd for Assignment<C, F>
    where
        C::Repr<F>: PartialOrd,
    {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            self.repr.partial_cmp(&other.repr)
        }
    }

    impl<C: Context, F: Family> Ord for Assignment<C, F>
    where
        C::Repr<F>: Ord,
    {
        fn cmp(&self, other: &Self) -> Ordering {
            self.repr.cmp(&other.repr)
        }
    }

    /// Hashes every slot, first slot first.
    impl<C: Context, F: Family> Hash for Assignment<C, F>
    where
        C::Repr<F>: Hash,
    {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.repr.hash(state)
        }
    }

    /// Renders as `[v0, v1, …]`.
    impl<C, F> fmt::Debug for Assignment<C, F>
    where
        C: Fold<C, F, Collect<DebugSlot>, Vec<String>>,
        F: Family,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let slots = self.to_list::<String, _>(DebugSlot);
            write!(f, "[{}]", slots.join(", "))
        }
    }

    /// Renders as `[v0, v1, …]`.
    impl<C, F> fmt::Display for Assignment<C, F>
    where
        C: Fold<C, F, Collect<DisplaySlot>, Vec<String>>,
        F: Family,
    {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let slots = self.to_list::<String, _>(DisplaySlot);
            write!(f, "[{}]", slots.join(", "))
        }
    }
}

pub mod dynamic {

    //! Heterogeneous sequences whose shape is only known at runtime.
    //!
    //! A [`DynAssignment`] is a vector of boxed [`Slot`]s
    //! called by a name `'ctx`.
    //! A [`DynIndex`]`<'ctx, T>` is a position
    //! that was checked, once, to hold a `T` in `'ctx`.
    //! Growing the sequence gives it a new name,
    //! along with a [`Grow`] that carries old indices over.

    use super::assignment::{Assignment, Fold, Generate};
    use super::call::{forge, Call};
    use super::called::Called;
    use super::ctx::Context;
    use super::error::Error;
    use super::index::Index;
    use super::kind::{Const, Family, Id};
    use super::link::{link, Link};
    use super::name::Name;
    use super::poly::{Collect, MapFn, TryGenerateFn};
    use core::any::{type_name, Any, TypeId};
    use core::cmp::Ordering;
    use core::fmt;
    use core::hash::{Hash, Hasher};
    use core::marker::PhantomData;

    /// A value whose kind is hidden,
    /// with the operations every kind supports.
    pub trait Slot: Any + fmt::Debug {
        /// Upcast, for downcasting.
        fn as_any(&self) -> &dyn Any;

        /// Upcast, for downcasting mutably.
        fn as_any_mut(&mut self) -> &mut dyn Any;

        /// Identity of the kind.
        fn kind(&self) -> TypeId;

        /// Name of the kind, for diagnostics.
        fn kind_name(&self) -> &'static str;

        /// A boxed copy.
        fn clone_slot(&self) -> Box<dyn Slot>;

        /// Same kind and equal values.
        fn eq_slot(&self, other: &dyn Slot) -> bool;

        /// Orders by kind first, then by value.
        fn cmp_slot(&self, other: &dyn Slot) -> Ordering;

        /// Hashes the kind, then the value.
        fn hash_slot(&self, state: &mut dyn Hasher);
    }

    impl<T> Slot for T
    where
        T: Any + Clone + fmt::Debug + Ord + Hash,
    {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }

        fn kind(&self) -> TypeId {
            TypeId::of::<T>()
        }

        fn kind_name(&self) -> &'static str {
            type_name::<T>()
        }

        fn clone_slot(&self) -> Box<dyn Slot> {
            Box::new(self.clone())
        }

        fn eq_slot(&self, other: &dyn Slot) -> bool {
            match other.as_any().downcast_ref::<T>() {
                Some(other) => self == other,
                None => false,
            }
        }

        fn cmp_slot(&self, other: &dyn Slot) -> Ordering {
            match other.as_any().downcast_ref::<T>() {
                Some(other) => Ord::cmp(self, other),
                None => TypeId::of::<T>().cmp(&other.kind()),
            }
        }

        fn hash_slot(&self, mut state: &mut dyn Hasher) {
            TypeId::of::<T>().hash(&mut state);
            Hash::hash(self, &mut state);
        }
    }

    /// A runtime-shaped heterogeneous sequence, called `'ctx`.
    ///
    /// What is known about `'ctx` is the length
    /// and the kind of every slot.
    pub struct DynAssignment<'ctx> {
        own: Call<'ctx, Vec<Box<dyn Slot>>>,
    }

    impl<'ctx> From<Call<'ctx, Vec<Box<dyn Slot>>>> for DynAssignment<'ctx> {
        fn from(own: Call<'ctx, Vec<Box<dyn Slot>>>) -> Self {
            DynAssignment { own }
        }
    }

    /// A position known to hold a `T` in the sequence `'ctx`.
    pub struct DynIndex<'ctx, T> {
        own: Link<'ctx, usize>,
        kind: PhantomData<fn(T) -> T>,
    }

    impl<'ctx, T> DynIndex<'ctx, T> {
        /// Say that a position holds a `T` in `'ctx`.
        ///
        /// # Safety
        ///
        /// The position must really be a slot of kind `T`.
        ///
        pub unsafe fn new(position: usize) -> Self {
            DynIndex {
                own: link(position),
                kind: PhantomData,
            }
        }

        /// Get the position of an index.
        pub fn index(&self) -> usize {
            self.own.body
        }
    }

    impl<'ctx, T> Clone for DynIndex<'ctx, T> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<'ctx, T> Copy for DynIndex<'ctx, T> {}

    impl<'ctx, T> PartialEq for DynIndex<'ctx, T> {
        fn eq(&self, other: &Self) -> bool {
            self.index() == other.index()
        }
    }

    impl<'ctx, T> Eq for DynIndex<'ctx, T> {}

    impl<'ctx, T> PartialOrd for DynIndex<'ctx, T> {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    impl<'ctx, T> Ord for DynIndex<'ctx, T> {
        fn cmp(&self, other: &Self) -> Ordering {
            self.index().cmp(&other.index())
        }
    }

    impl<'ctx, T> Hash for DynIndex<'ctx, T> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.index().hash(state)
        }
    }

    impl<'ctx, T> fmt::Debug for DynIndex<'ctx, T> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("DynIndex").field(&self.index()).finish()
        }
    }

    /// Proof that `'after` is `'before` with slots appended.
    pub struct Grow<'before, 'after> {
        names: PhantomData<(Name<'before>, Name<'after>)>,
    }

    impl<'before, 'after> Grow<'before, 'after> {
        /// The same slot, in the grown sequence.
        pub fn extend<T>(
            &self,
            index: DynIndex<'before, T>,
        ) -> DynIndex<'after, T> {
            // Appending moves no slot.
            unsafe { DynIndex::new(index.index()) }
        }
    }

    /// Partial mapping from a sequence to its init.
    pub struct Shrink<'before, 'after> {
        len: usize,
        names: PhantomData<(Name<'before>, Name<'after>)>,
    }

    impl<'before, 'after> Shrink<'before, 'after> {
        /// The same slot, unless it was the one dropped.
        pub fn restrict<T>(
            &self,
            index: DynIndex<'before, T>,
        ) -> Option<DynIndex<'after, T>> {
            (index.index() < self.len)
                .then(|| unsafe { DynIndex::new(index.index()) })
        }
    }

    impl<'ctx> DynAssignment<'ctx> {
        /// Number of slots.
        pub fn len(&self) -> usize {
            self.own.len()
        }

        /// Whether there are no slots.
        pub fn is_empty(&self) -> bool {
            self.own.is_empty()
        }

        /// The slots, first to last.
        pub fn iter(&self) -> impl Iterator<Item = &dyn Slot> + '_ {
            self.own.iter().map(|slot| &**slot)
        }

        /// The uniform results of `f` at every slot.
        pub fn to_list<R>(
            &self,
            f: impl FnMut(&dyn Slot) -> R,
        ) -> Vec<R> {
            self.iter().map(f).collect()
        }

        /// Like [`std::vec::Vec::push()`] but **justified**.
        ///
        /// The grown sequence gets a fresh name,
        /// so `body` receives:
        ///
        /// 0. Grown sequence
        /// 1. Index of the new slot
        /// 2. Diff carrying old indices to the new name
        ///
        /// ```
        /// use tyctx::called::Called;
        /// use tyctx::dynamic::{DynAssignment, Slot};
        ///
        /// Vec::<Box<dyn Slot>>::new().called(|slots| {
        ///     DynAssignment::from(slots).push(1_u8, |ctx, one, _| {
        ///         assert_eq!(*ctx.get(one), 1);
        ///     })
        /// });
        /// ```
        ///
        pub fn push<T, Out, Body>(self, value: T, body: Body) -> Out
        where
            T: Slot,
            Body: for<'changed> FnOnce(
                DynAssignment<'changed>,
                DynIndex<'changed, T>,
                Grow<'ctx, 'changed>,
            ) -> Out,
        {
            let mut slots = self.own.into_owned();
            let position = slots.len();
            slots.push(Box::new(value));
            slots.called(|slots| {
                body(
                    DynAssignment::from(slots),
                    // Upholds `new`: the last slot holds a `T`.
                    unsafe { DynIndex::new(position) },
                    Grow {
                        names: PhantomData,
                    },
                )
            })
        }

        /// Drops the last slot.
        ///
        /// The init gets a fresh name,
        /// so `body` receives:
        ///
        /// 0. The init of the sequence
        /// 1. The dropped value
        /// 2. Partial mapping from old indices to new ones
        ///
        /// An old index only reaches the init through the mapping:
        ///
        /// ```compile_fail
        /// use tyctx::called::Called;
        /// use tyctx::dynamic::{DynAssignment, Slot};
        ///
        /// Vec::<Box<dyn Slot>>::new().called(|slots| {
        ///     DynAssignment::from(slots).push(1_u8, |ctx, one, _| {
        ///         ctx.init(|rest, _, _| rest.get(one).clone())
        ///     })
        /// });
        /// ```
        ///
        pub fn init<Out, Body>(self, body: Body) -> Result<Out, Error>
        where
            Body: for<'after> FnOnce(
                DynAssignment<'after>,
                Box<dyn Slot>,
                Shrink<'ctx, 'after>,
            ) -> Out,
        {
            let mut slots = self.own.into_owned();
            let last = slots.pop().ok_or(Error::EmptyContext)?;
            let len = slots.len();
            Ok(slots.called(|slots| {
                body(
                    DynAssignment::from(slots),
                    last,
                    Shrink {
                        len,
                        names: PhantomData,
                    },
                )
            }))
        }

        /// Governed lookup: the index at `position`,
        /// if it exists and holds a `T`.
        pub fn index<T: Any>(
            &self,
            position: usize,
        ) -> Result<DynIndex<'ctx, T>, Error> {
            let slot = self.slot(position)?;
            if slot.as_any().is::<T>() {
                Ok(unsafe { DynIndex::new(position) })
            } else {
                Err(Error::KindMismatch {
                    position,
                    expected: type_name::<T>(),
                    found: slot.kind_name(),
                })
            }
        }

        /// Like [`Self::get`], but reports a violated precondition.
        pub fn try_get<T: Any>(
            &self,
            index: DynIndex<'ctx, T>,
        ) -> Result<&T, Error> {
            let position = index.index();
            let slot = self.slot(position)?;
            slot.as_any().downcast_ref::<T>().ok_or(Error::KindMismatch {
                position,
                expected: type_name::<T>(),
                found: slot.kind_name(),
            })
        }

        /// The value at `index`, **check-free**.
        ///
        /// Panics with the [`Error`] if `index`
        /// doesn’t describe this sequence.
        pub fn get<T: Any>(&self, index: DynIndex<'ctx, T>) -> &T {
            match self.try_get(index) {
                Ok(value) => value,
                Err(err) => panic!("{err}"),
            }
        }

        /// Like [`Self::get_mut`], but reports a violated precondition.
        pub fn try_get_mut<T: Any>(
            &mut self,
            index: DynIndex<'ctx, T>,
        ) -> Result<&mut T, Error> {
            let position = index.index();
            let len = self.len();
            // Upholds `as_mut`: a slot’s contents may change,
            // never its kind, and no slot is added or removed.
            let slots = unsafe { self.own.as_mut() };
            let slot = slots
                .get_mut(position)
                .ok_or(Error::OutOfRange { position, len })?;
            let found = slot.kind_name();
            slot.as_any_mut().downcast_mut::<T>().ok_or(Error::KindMismatch {
                position,
                expected: type_name::<T>(),
                found,
            })
        }

        /// The value at `index`, mutably, **check-free**.
        pub fn get_mut<T: Any>(
            &mut self,
            index: DynIndex<'ctx, T>,
        ) -> &mut T {
            match self.try_get_mut(index) {
                Ok(value) => value,
                Err(err) => panic!("{err}"),
            }
        }

        /// Replaces the value at `index`.
        pub fn update<T: Any>(
            &mut self,
            index: DynIndex<'ctx, T>,
            value: T,
        ) {
            *self.get_mut(index) = value;
        }

        /// Replaces the value at `index` with `f` of it.
        pub fn adjust<T: Any>(
            &mut self,
            index: DynIndex<'ctx, T>,
            f: impl FnOnce(&T) -> T,
        ) {
            let slot = self.get_mut(index);
            let value = f(slot);
            *slot = value;
        }

        /// Combines two sequences of the same shape slot by slot.
        ///
        /// Fails without combining anything
        /// if the lengths or kinds differ,
        /// or if `f` returns a different kind than it was given.
        pub fn zip_with<'other>(
            &self,
            other: &DynAssignment<'other>,
            mut f: impl FnMut(&dyn Slot, &dyn Slot) -> Box<dyn Slot>,
        ) -> Result<DynAssignment<'ctx>, Error> {
            if self.len() != other.len() {
                return Err(Error::ShapeMismatch {
                    left: self.len(),
                    right: other.len(),
                });
            }
            let pairs = || self.iter().zip(other.iter());
            if let Some((position, (left, right))) = pairs()
                .enumerate()
                .find(|(_, (left, right))| left.kind() != right.kind())
            {
                return Err(Error::KindMismatch {
                    position,
                    expected: left.kind_name(),
                    found: right.kind_name(),
                });
            }
            let mut slots = Vec::with_capacity(self.len());
            for (position, (left, right)) in pairs().enumerate() {
                let slot = f(left, right);
                if Slot::kind(&*slot) != left.kind() {
                    return Err(Error::KindMismatch {
                        position,
                        expected: left.kind_name(),
                        found: Slot::kind_name(&*slot),
                    });
                }
                slots.push(slot);
            }
            // The result has the shape of `self`.
            Ok(unsafe { DynAssignment::from(forge(slots)) })
        }

        /// Casts to a statically shaped assignment,
        /// after checking the length and every kind.
        pub fn cast<'a, C>(&'a self) -> Result<Assignment<C>, Error>
        where
            C: Generate<C, Id, Casting<'a, 'ctx>, Error>,
        {
            if self.len() != C::SIZE {
                return Err(Error::ShapeMismatch {
                    left: self.len(),
                    right: C::SIZE,
                });
            }
            Assignment::try_generate(C::known_size(), Casting { source: self })
        }

        fn slot(&self, position: usize) -> Result<&dyn Slot, Error> {
            match self.own.get(position) {
                Some(slot) => Ok(&**slot),
                None => Err(Error::OutOfRange {
                    position,
                    len: self.len(),
                }),
            }
        }
    } // impl DynAssignment

    impl<'ctx> Clone for DynAssignment<'ctx> {
        fn clone(&self) -> Self {
            let slots: Vec<Box<dyn Slot>> =
                self.iter().map(|slot| slot.clone_slot()).collect();
            // Same shape, so the same name.
            unsafe { DynAssignment::from(forge(slots)) }
        }
    }

    /// Different lengths are unequal without looking further.
    impl<'ctx, 'other> PartialEq<DynAssignment<'other>>
        for DynAssignment<'ctx>
    {
        fn eq(&self, other: &DynAssignment<'other>) -> bool {
            self.len() == other.len()
                && self
                    .iter()
                    .zip(other.iter())
                    .all(|(left, right)| left.eq_slot(right))
        }
    }

    impl<'ctx> Eq for DynAssignment<'ctx> {}

    /// Shorter sequences come first.
    /// Between equal lengths, the first differing slot decides:
    /// slots of different kinds order by `TypeId`,
    /// which is stable within one build only.
    impl<'ctx, 'other> PartialOrd<DynAssignment<'other>>
        for DynAssignment<'ctx>
    {
        fn partial_cmp(
            &self,
            other: &DynAssignment<'other>,
        ) -> Option<Ordering> {
            Some(compare(self, other))
        }
    }

    impl<'ctx> Ord for DynAssignment<'ctx> {
        fn cmp(&self, other: &Self) -> Ordering {
            compare(self, other)
        }
    }

    fn compare(
        left: &DynAssignment<'_>,
        right: &DynAssignment<'_>,
    ) -> Ordering {
        left.len().cmp(&right.len()).then_with(|| {
            left.iter()
                .zip(right.iter())
                .map(|(left, right)| left.cmp_slot(right))
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        })
    }

    impl<'ctx> Hash for DynAssignment<'ctx> {
        fn hash<H: Hasher>(&self, state: &mut H) {
            self.len().hash(state);
            for slot in self.iter() {
                slot.hash_slot(&mut *state);
            }
        }
    }

    impl<'ctx> fmt::Debug for DynAssignment<'ctx> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_list().entries(self.iter()).finish()
        }
    }

    /// Generates a static assignment from a dynamic one.
    pub struct Casting<'a, 'ctx> {
        source: &'a DynAssignment<'ctx>,
    }

    impl<'a, 'ctx, C, T> TryGenerateFn<C, Id, T, Error> for Casting<'a, 'ctx>
    where
        T: Any + Clone,
    {
        fn try_generate(&mut self, index: Index<C, T>) -> Result<T, Error> {
            let key = self.source.index::<T>(index.index())?;
            self.source.try_get(key).cloned()
        }
    }

    /// Boxes each value, hiding its kind.
    pub struct Erase;

    impl<F, T> MapFn<F, Const<Box<dyn Slot>>, T> for Erase
    where
        F: Family,
        F::Of<T>: Slot,
    {
        fn map(&mut self, value: &F::Of<T>) -> Box<dyn Slot> {
            Slot::clone_slot(value)
        }
    }

    impl<C: Context, F: Family> Assignment<C, F> {
        /// Runs `body` on a dynamic copy of this assignment.
        pub fn to_dyn<Out, Body>(&self, body: Body) -> Out
        where
            C: Fold<C, F, Collect<Erase>, Vec<Box<dyn Slot>>>,
            Body: for<'ctx> FnOnce(DynAssignment<'ctx>) -> Out,
        {
            self.to_list::<Box<dyn Slot>, _>(Erase)
                .called(|slots| body(DynAssignment::from(slots)))
        }
    }
}

pub mod error {

    //! What can go wrong when shapes are only known at runtime.
    //!
    //! Static contexts rule all of these out by their types.

    /// A violated precondition of the dynamic form.
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum Error {
        /// A position past the end.
        #[error("position {position} is out of range for a context of length {len}")]
        OutOfRange {
            /// The position asked for.
            position: usize,
            /// The length of the context.
            len: usize,
        },

        /// A slot of another kind than expected.
        #[error("slot {position} holds `{found}`, not `{expected}`")]
        KindMismatch {
            /// The position of the slot.
            position: usize,
            /// The kind asked for.
            expected: &'static str,
            /// The kind actually there.
            found: &'static str,
        },

        /// Two contexts of different lengths.
        #[error("contexts of lengths {left} and {right} have different shapes")]
        ShapeMismatch {
            /// Length of the left-hand context.
            left: usize,
            /// Length of the right-hand context.
            right: usize,
        },

        /// Dropping the last slot of nothing.
        #[error("cannot drop the last slot of an empty context")]
        EmptyContext,
    }
}

/// Spells a context type, first slot first.
///
/// `ctx![A, B]` is `Snoc<Snoc<EmptyCtx, A>, B>`.
#[macro_export]
macro_rules! ctx {
    (@snoc $acc:ty;) => { $acc };
    (@snoc $acc:ty; $kind:ty $(, $rest:ty)*) => {
        $crate::ctx!(@snoc $crate::ctx::Snoc<$acc, $kind>; $($rest),*)
    };
    () => { $crate::ctx::EmptyCtx };
    ($($kind:ty),+ $(,)?) => {
        $crate::ctx!(@snoc $crate::ctx::EmptyCtx; $($kind),+)
    };
}

/// Builds an [`assignment::Assignment`] by extending the empty one,
/// first value first.
#[macro_export]
macro_rules! assign {
    ($($value:expr),* $(,)?) => {
        $crate::assignment::Assignment::<
            $crate::ctx::EmptyCtx,
            $crate::kind::Id,
        >::empty()
        $(.extend($value))*
    };
}

#[cfg(test)]
mod tests {

    use super::assignment::Assignment;
    use super::called::Called;
    use super::ctx::{Context, EmptyCtx};
    use super::diff::{ext_size, known_diff, no_diff, Diff};
    use super::dynamic::{DynAssignment, DynIndex, Slot};
    use super::error::Error;
    use super::index::{
        base, for_index, index_list, int_index, last_index,
        next_index, Index, IndexCont, IndexFold,
    };
    use super::kind::{Const, Id, IndexOf, OptionOf};
    use super::poly::{
        CloneSlot, DisplaySlot, GenerateFn, MapFn, TraverseFn,
        TryGenerateFn, ZipFn,
    };
    use super::proof::{refl, symm, trans};
    use super::size::{known_size, size_int, zero_size, Size};
    use core::any::type_name;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    type Abc = ctx![i64, String, bool];

    fn abc() -> Assignment<Abc> {
        assign![10_i64, String::from("x"), true]
    }

    fn first() -> Index<Abc, i64> {
        base::<i64>().extend_known::<Abc, _>()
    }

    fn second() -> Index<Abc, String> {
        next_index::<ctx![i64], String>(known_size()).skip::<bool>()
    }

    fn third() -> Index<Abc, bool> {
        last_index(known_size::<Abc>())
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    /// Each slot holds its own position.
    struct Position;

    impl<C, T> GenerateFn<C, Const<usize>, T> for Position {
        fn generate(&mut self, index: Index<C, T>) -> usize {
            index.index()
        }
    }

    /// Records positions in the order they’re visited.
    struct Visit<'log>(&'log mut Vec<usize>);

    impl<'log, C, T> GenerateFn<C, Const<usize>, T> for Visit<'log> {
        fn generate(&mut self, index: Index<C, T>) -> usize {
            self.0.push(index.index());
            index.index() * 10
        }
    }

    /// Fails at one position, recording every attempt.
    struct FailAt<'log> {
        position: usize,
        log: &'log mut Vec<usize>,
    }

    impl<'log, C, T> TryGenerateFn<C, Const<usize>, T, usize>
        for FailAt<'log>
    {
        fn try_generate(
            &mut self,
            index: Index<C, T>,
        ) -> Result<usize, usize> {
            self.log.push(index.index());
            if index.index() == self.position {
                Err(index.index())
            } else {
                Ok(index.index())
            }
        }
    }

    impl<'log, C, T: Clone> TraverseFn<C, Id, Id, T, usize>
        for FailAt<'log>
    {
        fn traverse(
            &mut self,
            index: Index<C, T>,
            value: &T,
        ) -> Result<T, usize> {
            self.log.push(index.index());
            if index.index() == self.position {
                Err(index.index())
            } else {
                Ok(value.clone())
            }
        }
    }

    struct Positions;

    impl<C, T> IndexFold<C, T, Vec<usize>> for Positions {
        fn step(
            &mut self,
            mut acc: Vec<usize>,
            index: Index<C, T>,
        ) -> Vec<usize> {
            acc.push(index.index());
            acc
        }
    }

    struct KindName;

    impl<C, T> IndexCont<C, T> for KindName {
        type Output = &'static str;
        fn call(self, _index: Index<C, T>) -> &'static str {
            type_name::<T>()
        }
    }

    struct Larger;

    impl<T: Ord + Clone> ZipFn<Id, Id, Id, T> for Larger {
        fn zip(&mut self, left: &T, right: &T) -> T {
            left.max(right).clone()
        }
    }

    struct Wrap;

    impl<T: Clone> MapFn<Id, OptionOf, T> for Wrap {
        fn map(&mut self, value: &T) -> Option<T> {
            Some(value.clone())
        }
    }

    #[test]
    fn end_to_end() {
        let a = abc();
        let rendered: Vec<String> = a.to_list(DisplaySlot);
        assert_eq!(rendered, ["10", "x", "true"]);
        assert_eq!(a[second()], "x");

        let b = a.clone().update(third(), false);
        assert!(!b[third()]);
        assert_eq!(b[first()], 10);
        assert_ne!(a, b);
    }

    #[test]
    fn extend_then_lookup() {
        let a = abc();
        assert_eq!(*a.get(first()), 10);
        assert_eq!(a.get(second()), "x");
        assert!(*a.get(third()));
        assert_eq!(a.last(), &true);
        assert_eq!(size_int(a.size()), 3);
        assert!(!a.is_null());
        assert!(Assignment::<EmptyCtx>::empty().is_null());
    }

    #[test]
    fn rendering() {
        assert_eq!(format!("{:?}", abc()), r#"[10, "x", true]"#);
        assert_eq!(abc().to_string(), "[10, x, true]");
        assert_eq!(format!("{:?}", Assignment::<EmptyCtx>::empty()), "[]");
    }

    #[test]
    fn init_drops_last() {
        let (init, last) = abc().split_last();
        assert!(last);
        assert_eq!(init, assign![10_i64, String::from("x")]);
        assert_eq!(abc().init().init(), assign![10_i64]);
    }

    #[test]
    fn adjust_changes_one_slot() {
        let a = abc();
        let b = a.clone().adjust(second(), |s| format!("{s}y"));
        assert_eq!(b[second()], "xy");
        assert_eq!(b[first()], a[first()]);
        assert_eq!(b[third()], a[third()]);
    }

    #[test]
    fn get_mut_in_place() {
        let mut a = abc();
        a[first()] += 5;
        a.get_mut(second()).push('!');
        assert_eq!(a, assign![15_i64, String::from("x!"), true]);
    }

    #[test]
    fn index_list_is_ascending() {
        let indices = index_list(known_size::<ctx![u8, u16, u32, u64]>());
        let positions: Vec<usize> =
            indices.iter().map(|index| index.index()).collect();
        assert_eq!(positions, [0, 1, 2, 3]);
    }

    #[test]
    fn int_index_bounds() {
        let size = known_size::<Abc>();
        for position in 0..3 {
            assert_eq!(
                int_index(position, size).map(|index| index.index()),
                Some(position)
            );
        }
        assert!(int_index(3, size).is_none());
        assert!(int_index(0, zero_size()).is_none());
    }

    #[test]
    fn some_index_recovers_kind() {
        let size = known_size::<Abc>();
        let names: Vec<&str> = index_list(size)
            .into_iter()
            .map(|index| index.with_index(KindName))
            .collect();
        assert_eq!(
            names,
            [type_name::<i64>(), type_name::<String>(), type_name::<bool>()]
        );

        let some = int_index(1, size).unwrap();
        assert_eq!(some.downcast::<String>(), Some(second()));
        assert!(some.downcast::<bool>().is_none());
        assert_eq!(some.kind_name(), type_name::<String>());
    }

    #[test]
    fn for_index_is_ascending() {
        let positions =
            for_index(known_size::<Abc>(), Vec::new(), Positions);
        assert_eq!(positions, [0, 1, 2]);
    }

    #[test]
    fn diffs_compose() {
        let d1: Diff<ctx![u8], ctx![u8, u16, u32]> =
            no_diff().extend_right().extend_right();
        let d2: Diff<ctx![u8, u16, u32], ctx![u8, u16, u32, u64, i8]> =
            no_diff().extend_right().extend_right();
        let composed = d1.compose(d2);
        assert_eq!(composed.appended(), 4);

        let lifted = base::<u8>().extend(composed);
        let skipped = base::<u8>()
            .skip::<u16>()
            .skip::<u32>()
            .skip::<u64>()
            .skip::<i8>();
        assert_eq!(lifted, skipped);
        assert_eq!(lifted.extend(no_diff()), skipped);
        assert_eq!(
            size_int(ext_size(known_size(), composed)),
            <ctx![u8, u16, u32, u64, i8]>::SIZE
        );
        assert_eq!(composed, known_diff());
    }

    #[test]
    fn lifted_index_reads_same_value() {
        let small = assign![1_u8, 'c'];
        let index = last_index(small.size());
        let big = small.clone().extend(2_u16).extend("s");
        let lifted = index.extend_known::<ctx![u8, char, u16, &str], _>();
        assert_eq!(small[index], big[lifted]);
    }

    #[test]
    fn test_equality_coerces() {
        let some = int_index(0, known_size::<Abc>()).unwrap();
        let index = some.downcast::<i64>().unwrap();
        let same = first().test_equality(&index).unwrap();
        assert_eq!(same.coerce(7_i64), 7_i64);
        assert!(first().test_equality(&second()).is_none());
    }

    #[test]
    fn proofs_compose() {
        let same = refl::<u32>();
        let both = trans(&same, &symm(&same));
        assert_eq!(both.coerce(3_u32), 3);

        let mut value = 4_u32;
        *same.coerce_mut(&mut value) += 1;
        assert_eq!(*same.coerce_ref(&value), 5);
        assert_eq!(same.lift::<OptionOf>().coerce(Some(6_u32)), Some(6));
    }

    #[test]
    fn generate_visits_in_order() {
        let mut log = Vec::new();
        let a = Assignment::<Abc, Const<usize>>::generate(
            known_size(),
            Visit(&mut log),
        );
        assert_eq!(log, [0, 1, 2]);
        let values: Vec<usize> = a.to_list(CloneSlot);
        assert_eq!(values, [0, 10, 20]);

        let b = Assignment::<Abc, Const<usize>>::generate(
            known_size(),
            Position,
        );
        assert_eq!(b[second()], 1);
    }

    #[test]
    fn try_generate_short_circuits() {
        let mut log = Vec::new();
        let result = Assignment::<Abc, Const<usize>>::try_generate(
            known_size(),
            FailAt {
                position: 1,
                log: &mut log,
            },
        );
        assert_eq!(result, Err(1));
        assert_eq!(log, [0, 1]);
    }

    #[test]
    fn traverse_short_circuits() {
        let mut log = Vec::new();
        let result: Result<Assignment<Abc>, usize> =
            abc().traverse_with_index(FailAt {
                position: 1,
                log: &mut log,
            });
        assert_eq!(result, Err(1));
        assert_eq!(log, [0, 1]);

        let mut log = Vec::new();
        let copy: Result<Assignment<Abc>, usize> =
            abc().traverse_with_index(FailAt {
                position: 9,
                log: &mut log,
            });
        assert_eq!(copy, Ok(abc()));
        assert_eq!(log, [0, 1, 2]);
    }

    #[test]
    fn replicate_and_indices() {
        let r = Assignment::<Abc, Const<&str>>::replicate(known_size(), "r");
        let values: Vec<&str> = r.to_list(CloneSlot);
        assert_eq!(values, ["r", "r", "r"]);

        let indices = Assignment::<Abc, IndexOf<Abc>>::indices(known_size());
        assert_eq!(indices[first()], first());
        assert_eq!(indices[second()], second());
        assert_eq!(indices[third()], third());
    }

    #[test]
    fn zip_with_self_matches_map() {
        let a = abc();
        let zipped: Assignment<Abc> = a.zip_with(&a, Larger);
        let mapped: Assignment<Abc> = a.map(CloneSlot);
        assert_eq!(zipped, mapped);

        let b = assign![3_i64, String::from("y"), false];
        let larger: Assignment<Abc> = a.zip_with(&b, Larger);
        assert_eq!(larger, assign![10_i64, String::from("y"), true]);
    }

    #[test]
    fn map_changes_family() {
        let wrapped: Assignment<Abc, OptionOf> = abc().map(Wrap);
        assert_eq!(wrapped[second()], Some(String::from("x")));
    }

    #[test]
    fn ordering_and_hashing() {
        let a = abc();
        let b = a.clone().update(first(), 11);
        let c = a.clone().update(second(), String::from("a"));
        assert!(a < b);
        assert!(c < a);
        assert_eq!(hash_of(&a), hash_of(&abc()));
        assert_ne!(hash_of(&a), hash_of(&b));
    }

    fn first_byte(bytes: &u8) -> u8 {
        *bytes
    }

    #[test]
    fn higher_ranked_kinds_keep_their_index() {
        type General = for<'a> fn(&'a u8) -> u8;
        let mut a = assign![first_byte as General];
        let index: Index<ctx![General], General> = base::<General>();
        assert_eq!((a[index])(&1), 1);
        a[index] = |byte| byte.wrapping_add(1);
        assert_eq!((a[index])(&1), 2);
    }

    #[test]
    #[should_panic]
    #[cfg(any(debug_assertions, feature = "checked-kinds"))]
    fn forged_index_is_caught_in_debug() {
        let forged = unsafe { Index::<Abc, bool>::new_unchecked(0) };
        let _ = abc()[forged];
    }

    #[test]
    fn sizes() {
        let size: Size<ctx![u8, u8]> = known_size();
        assert_eq!(size_int(size), 2);
        assert_eq!(size_int(zero_size()), 0);
        assert_eq!(<ctx![]>::SIZE, 0);
    }

    #[test]
    fn named_context() {
        Vec::<Box<dyn Slot>>::new().called(|slots| {
            let ctx = DynAssignment::from(slots);
            ctx.push(String::from("taxes.txt"), |ctx, _, _| {
                ctx.push(String::from("passwords.txt"), |ctx, _, _| {
                    let passwords = ctx.index::<String>(1).unwrap();
                    assert_eq!(ctx.get(passwords), "passwords.txt");
                    ctx.push(7_u32, |ctx, poems, upcast| {
                        fn assert_type<'passwords, 'poems>(
                            _: &DynIndex<'passwords, String>,
                            _: &DynIndex<'poems, u32>,
                        ) {
                        }
                        assert_type(&passwords, &poems);
                        assert_eq!(*ctx.get(poems), 7);
                        assert_eq!(
                            ctx.get(upcast.extend(passwords)),
                            "passwords.txt"
                        );
                    })
                })
            })
        });
    }

    #[test]
    fn governed_lookup() {
        Vec::<Box<dyn Slot>>::new().called(|slots| {
            DynAssignment::from(slots).push(1_i32, |ctx, _, _| {
                assert_eq!(
                    ctx.index::<i32>(1),
                    Err(Error::OutOfRange {
                        position: 1,
                        len: 1
                    })
                );
                assert_eq!(
                    ctx.index::<bool>(0),
                    Err(Error::KindMismatch {
                        position: 0,
                        expected: type_name::<bool>(),
                        found: type_name::<i32>(),
                    })
                );
                let last = ctx
                    .init(|empty, last, _| {
                        assert!(empty.is_empty());
                        assert_eq!(
                            empty.init(|_, _, _| ()).err(),
                            Some(Error::EmptyContext)
                        );
                        last
                    })
                    .unwrap();
                assert_eq!(last.as_any().downcast_ref::<i32>(), Some(&1));
            })
        });
    }

    #[test]
    fn dynamic_update_and_shrink() {
        Vec::<Box<dyn Slot>>::new().called(|slots| {
            let ctx = DynAssignment::from(slots);
            ctx.push(1_i32, |ctx, n, _| {
                ctx.push(String::from("a"), |mut ctx, s, grow| {
                    let n = grow.extend(n);
                    ctx.update(n, 5);
                    ctx.adjust(s, |s| format!("{s}b"));
                    assert_eq!(*ctx.get(n), 5);
                    assert_eq!(ctx.get(s), "ab");

                    let read = ctx.init(|ctx, _, shrink| {
                        assert!(shrink.restrict(s).is_none());
                        let n = shrink.restrict(n).unwrap();
                        *ctx.get(n)
                    });
                    assert_eq!(read, Ok(5));
                })
            })
        });
    }

    #[test]
    fn shrinking_then_growing_renames() {
        abc().to_dyn(|a| {
            let flag = a.index::<bool>(2).unwrap();
            let renamed = a.clone().init(|rest, _, shrink| {
                assert!(shrink.restrict(flag).is_none());
                rest.push(0_u8, |grown, byte, _| {
                    assert_eq!(grown.len(), a.len());
                    assert!(matches!(
                        grown.index::<bool>(2),
                        Err(Error::KindMismatch { position: 2, .. })
                    ));
                    *grown.get(byte)
                })
            });
            assert_eq!(renamed, Ok(0));
            assert!(*a.get(flag));
        });
    }

    #[test]
    fn dynamic_zip_checks_shape() {
        abc().to_dyn(|a| {
            let twice = a
                .zip_with(&a, |left, _| left.clone_slot())
                .unwrap();
            assert_eq!(twice, a);

            let changed = a.zip_with(&a, |_, _| Box::new(0_u8));
            assert!(matches!(
                changed,
                Err(Error::KindMismatch { position: 0, .. })
            ));

            assign![1_i64].to_dyn(|short| {
                assert_eq!(
                    a.zip_with(&short, |left, _| left.clone_slot()).err(),
                    Some(Error::ShapeMismatch { left: 3, right: 1 })
                );
                assert_ne!(a, short);
                assert!(short < a);
            });
        });
    }

    #[test]
    fn dynamic_round_trip() {
        abc().to_dyn(|a| {
            assert_eq!(format!("{a:?}"), r#"[10, "x", true]"#);
            assert_eq!(a.cast::<Abc>(), Ok(abc()));
            assert_eq!(
                a.cast::<ctx![i64, String]>().err(),
                Some(Error::ShapeMismatch { left: 3, right: 2 })
            );
            assert!(matches!(
                a.cast::<ctx![i64, bool, bool]>(),
                Err(Error::KindMismatch { position: 1, .. })
            ));
        });
    }

    #[test]
    fn dynamic_ordering() {
        assign![1_i64, 2_u8].to_dyn(|a| {
            assign![1_i64, 3_u8].to_dyn(|b| {
                assert!(a < b);
                assert_ne!(a, b);
                let c = b.clone();
                assert_eq!(b, c);
                assert_eq!(hash_of(&b), hash_of(&c));
            });
            assign![9_i64].to_dyn(|short| {
                assert!(short < a);
            });
        });
    }
}
