/// 延迟销毁回调的 LIFO 栈
///
/// 资源按创建的逆序销毁，后注册的回调先执行。
/// 泛型参数 C 是回调执行时可用的上下文（通常是图形后端根对象）。
pub struct CleanupStack<C> {
    callbacks: Vec<Box<dyn FnOnce(&C)>>,
}

impl<C> Default for CleanupStack<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CleanupStack<C> {
    pub fn new() -> Self {
        Self { callbacks: Vec::new() }
    }

    pub fn push(&mut self, callback: impl FnOnce(&C) + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    /// 按注册的逆序执行并清空所有回调
    pub fn flush(&mut self, ctx: &C) {
        while let Some(callback) = self.callbacks.pop() {
            callback(ctx);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[test]
    fn flush_runs_in_reverse_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut stack = CleanupStack::<()>::new();

        for i in 0..3 {
            let order = order.clone();
            stack.push(move |_| order.borrow_mut().push(i));
        }

        stack.flush(&());
        assert_eq!(*order.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn flush_empties_the_stack() {
        let mut stack = CleanupStack::<()>::new();
        stack.push(|_| {});
        stack.push(|_| {});
        assert_eq!(stack.len(), 2);

        stack.flush(&());
        assert!(stack.is_empty());

        // 再次 flush 不做任何事
        stack.flush(&());
    }

    #[test]
    fn callbacks_receive_the_context() {
        let seen = Rc::new(RefCell::new(0));
        let mut stack = CleanupStack::<i32>::new();

        let seen_inner = seen.clone();
        stack.push(move |ctx| *seen_inner.borrow_mut() = *ctx);

        stack.flush(&42);
        assert_eq!(*seen.borrow(), 42);
    }
}
