/// 事件流
///
/// 推送式、无缓冲、多监听者的广播原语。`push` 同步地按注册顺序通知
/// 当前所有监听者；新监听者看不到历史值。派生流通过 `pipe` 创建，
/// 并在源流的整个生命周期内保持订阅。
///
/// 同一个流上的推送逐个完成，所有监听者看到相同的全局顺序。

use parking_lot::ReentrantMutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::mpsc;
use tracing::warn;

/// 监听者回调
type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// 监听者表（类型擦除，供 [`Subscription`] 使用）
trait ListenerTable: Send + Sync {
    fn remove(&self, id: u64);
}

struct Inner<T> {
    /// 按注册顺序保存
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
    next_id: AtomicU64,
    /// 投递锁：跨线程串行化推送，同一线程内允许监听者再次推送
    delivery: ReentrantMutex<()>,
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Vec<(u64, Listener<T>)>> {
        // 回调在锁外执行，锁不会因回调 panic 而中毒
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> ListenerTable for Inner<T> {
    fn remove(&self, id: u64) {
        self.lock().retain(|(listener_id, _)| *listener_id != id);
    }
}

/// 事件流
///
/// 克隆得到的是同一个流（共享监听者），用 [`EventStream::same_stream`] 判断身份。
pub struct EventStream<T> {
    inner: Arc<Inner<T>>,
}

impl<T: 'static> EventStream<T> {
    /// 创建新的事件流
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                delivery: ReentrantMutex::new(()),
            }),
        }
    }

    /// 注册监听者，返回取消订阅句柄
    pub fn listen<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.listen_with_id(|_| {
            let listener: Listener<T> = Arc::new(callback);
            listener
        })
    }

    /// 注册监听者；构造回调时可拿到自己的订阅 ID
    fn listen_with_id<F>(&self, make: F) -> Subscription
    where
        F: FnOnce(u64) -> Listener<T>,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener = make(id);
        self.inner.lock().push((id, listener));

        let table: Weak<dyn ListenerTable> = Arc::downgrade(&self.inner) as Weak<dyn ListenerTable>;
        Subscription { id, table }
    }

    /// 同步推送一个值
    ///
    /// 推送开始时已注册的监听者各被调用一次。投递期间新增或移除的监听者
    /// 不影响本次推送。监听者 panic 会被隔离，不影响后续监听者。
    pub fn push(&self, value: T) {
        let _delivery = self.inner.delivery.lock();

        let snapshot: Vec<Listener<T>> = self
            .inner
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(&value))).is_err() {
                warn!("事件监听者执行失败，已跳过");
            }
        }
    }

    /// 通过算子派生新流
    pub fn pipe<O>(&self, operator: O) -> EventStream<O::Output>
    where
        O: Operator<T>,
        O::Output: 'static,
    {
        let derived = EventStream::new();
        let target = derived.clone();
        // 派生流随源流存活，订阅从不取消
        let _subscription = self.listen(move |value| {
            if let Some(output) = operator.apply(value) {
                target.push(output);
            }
        });
        derived
    }

    /// 过滤
    pub fn filter<F>(&self, predicate: F) -> EventStream<T>
    where
        T: Clone,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.pipe(filter(predicate))
    }

    /// 映射
    pub fn map<U, F>(&self, f: F) -> EventStream<U>
    where
        U: 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        self.pipe(map(f))
    }

    /// 过滤并映射
    pub fn filter_map<U, F>(&self, f: F) -> EventStream<U>
    where
        U: 'static,
        F: Fn(&T) -> Option<U> + Send + Sync + 'static,
    {
        self.pipe(filter_map(f))
    }

    /// 桥接到异步通道，供 `await` 风格的消费者使用
    ///
    /// 接收端被丢弃后，下一次推送时桥接监听者会自行移除。
    pub fn channel(&self) -> (Subscription, mpsc::UnboundedReceiver<T>)
    where
        T: Clone + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let table = Arc::downgrade(&self.inner);
        let subscription = self.listen_with_id(move |id| {
            let listener: Listener<T> = Arc::new(move |value: &T| {
                if tx.send(value.clone()).is_err() {
                    if let Some(inner) = table.upgrade() {
                        inner.remove(id);
                    }
                }
            });
            listener
        });
        (subscription, rx)
    }

    /// 当前监听者数量
    pub fn listener_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// 是否是同一个流
    pub fn same_stream(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Default for EventStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// 取消订阅句柄
///
/// 丢弃句柄不会取消订阅；多次调用 [`Subscription::unsubscribe`] 是空操作。
pub struct Subscription {
    id: u64,
    table: Weak<dyn ListenerTable>,
}

impl Subscription {
    /// 移除对应的监听者
    pub fn unsubscribe(&self) {
        if let Some(table) = self.table.upgrade() {
            table.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// 流算子
pub trait Operator<T>: Send + Sync + 'static {
    type Output;

    fn apply(&self, value: &T) -> Option<Self::Output>;
}

pub struct Filter<F>(F);

pub struct Map<F>(F);

pub struct FilterMap<F>(F);

/// 只保留满足条件的值
pub fn filter<F>(predicate: F) -> Filter<F> {
    Filter(predicate)
}

/// 转换每个值
pub fn map<F>(f: F) -> Map<F> {
    Map(f)
}

/// 转换并丢弃 `None`
pub fn filter_map<F>(f: F) -> FilterMap<F> {
    FilterMap(f)
}

impl<T, F> Operator<T> for Filter<F>
where
    T: Clone,
    F: Fn(&T) -> bool + Send + Sync + 'static,
{
    type Output = T;

    fn apply(&self, value: &T) -> Option<T> {
        (self.0)(value).then(|| value.clone())
    }
}

impl<T, U, F> Operator<T> for Map<F>
where
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    type Output = U;

    fn apply(&self, value: &T) -> Option<U> {
        Some((self.0)(value))
    }
}

impl<T, U, F> Operator<T> for FilterMap<F>
where
    F: Fn(&T) -> Option<U> + Send + Sync + 'static,
{
    type Output = U;

    fn apply(&self, value: &T) -> Option<U> {
        (self.0)(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |value: &T| sink.lock().unwrap().push(value.clone()))
    }

    #[test]
    fn test_push_delivers_in_order() {
        let stream = EventStream::new();
        let (first, cb1) = recorder::<i32>();
        let (second, cb2) = recorder::<i32>();
        stream.listen(cb1);
        stream.listen(cb2);

        stream.push(1);
        stream.push(2);
        stream.push(3);

        assert_eq!(*first.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(*second.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_listeners_called_in_registration_order() {
        let stream = EventStream::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let order = order.clone();
            stream.listen(move |_: &()| order.lock().unwrap().push(name));
        }

        stream.push(());

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_replay_for_late_listener() {
        let stream = EventStream::new();
        stream.push("early");

        let (seen, cb) = recorder::<&'static str>();
        stream.listen(cb);
        stream.push("late");

        assert_eq!(*seen.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let stream = EventStream::new();
        let (kept, cb1) = recorder::<i32>();
        let (removed, cb2) = recorder::<i32>();
        stream.listen(cb1);
        let sub = stream.listen(cb2);

        stream.push(1);
        sub.unsubscribe();
        sub.unsubscribe();
        stream.push(2);

        assert_eq!(*kept.lock().unwrap(), vec![1, 2]);
        assert_eq!(*removed.lock().unwrap(), vec![1]);
        assert_eq!(stream.listener_count(), 1);
    }

    #[test]
    fn test_unsubscribe_after_stream_dropped() {
        let stream = EventStream::<i32>::new();
        let sub = stream.listen(|_| {});
        drop(stream);
        sub.unsubscribe();
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let stream = EventStream::new();
        let (before, cb1) = recorder::<i32>();
        let (after, cb2) = recorder::<i32>();
        stream.listen(cb1);
        stream.listen(|value: &i32| {
            if *value == 2 {
                panic!("listener failure");
            }
        });
        stream.listen(cb2);

        stream.push(1);
        stream.push(2);
        stream.push(3);

        assert_eq!(*before.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(*after.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_listener_added_during_push_keeps_existing_delivery() {
        let stream = EventStream::new();
        let (seen, cb) = recorder::<i32>();
        let (late, late_cb) = recorder::<i32>();
        let late_cb = Arc::new(late_cb);

        let handle = stream.clone();
        let added = Arc::new(Mutex::new(false));
        stream.listen(move |_: &i32| {
            let mut added = added.lock().unwrap();
            if !*added {
                *added = true;
                let late_cb = late_cb.clone();
                handle.listen(move |v| late_cb(v));
            }
        });
        stream.listen(cb);

        stream.push(1);
        stream.push(2);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(*late.lock().unwrap(), vec![2]);
    }

    #[test]
    fn test_listener_removing_itself_during_push() {
        let stream = EventStream::new();
        let (seen, cb) = recorder::<i32>();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let own = slot.clone();
        let sub = stream.listen(move |_: &i32| {
            if let Some(sub) = own.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);
        stream.listen(cb);

        stream.push(1);
        stream.push(2);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(stream.listener_count(), 1);
    }

    #[test]
    fn test_pipe_filter_and_map() {
        let source = EventStream::new();
        let evens = source.pipe(filter(|v: &i32| v % 2 == 0));
        let labels = evens.map(|v: &i32| format!("#{v}"));
        let (seen, cb) = recorder::<String>();
        labels.listen(cb);

        for v in 1..=6 {
            source.push(v);
        }

        assert_eq!(*seen.lock().unwrap(), vec!["#2", "#4", "#6"]);
    }

    #[test]
    fn test_filter_map_drops_none() {
        let source = EventStream::new();
        let parsed = source.filter_map(|s: &&str| s.parse::<u32>().ok());
        let (seen, cb) = recorder::<u32>();
        parsed.listen(cb);

        source.push("1");
        source.push("x");
        source.push("3");

        assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_derived_stream_outlives_local_handle() {
        let source = EventStream::new();
        let (seen, cb) = recorder::<i32>();
        {
            let doubled = source.map(|v: &i32| v * 2);
            doubled.listen(cb);
        }

        source.push(21);

        assert_eq!(*seen.lock().unwrap(), vec![42]);
    }

    #[test]
    fn test_clone_is_same_stream() {
        let stream = EventStream::<i32>::new();
        let other = stream.clone();
        assert!(stream.same_stream(&other));
        assert!(!stream.same_stream(&EventStream::new()));
    }

    #[test]
    fn test_concurrent_pushes_share_one_order() {
        let stream = EventStream::new();
        let (first, slow) = recorder::<i32>();
        let (second, cb) = recorder::<i32>();
        stream.listen(move |value: &i32| {
            if *value == 1 {
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
            slow(value);
        });
        stream.listen(cb);

        let pushers: Vec<_> = [1, 2]
            .into_iter()
            .map(|value| {
                let stream = stream.clone();
                std::thread::spawn(move || stream.push(value))
            })
            .collect();
        for pusher in pushers {
            pusher.join().unwrap();
        }

        let first = first.lock().unwrap().clone();
        let second = second.lock().unwrap().clone();
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_listener_can_push_to_same_stream() {
        let stream = EventStream::new();
        let (seen, cb) = recorder::<i32>();
        let handle = stream.clone();
        stream.listen(move |value: &i32| {
            if *value < 3 {
                handle.push(value + 1);
            }
        });
        stream.listen(cb);

        stream.push(1);

        assert_eq!(*seen.lock().unwrap(), vec![3, 2, 1]);
    }

    #[test]
    fn test_channel_listener_removed_after_receiver_dropped() {
        let stream = EventStream::new();
        let (_kept, cb) = recorder::<i32>();
        stream.listen(cb);
        for _ in 0..100 {
            let (_sub, rx) = stream.channel();
            drop(rx);
        }
        assert_eq!(stream.listener_count(), 101);

        stream.push(1);

        assert_eq!(stream.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_channel_bridge() {
        let stream = EventStream::new();
        let (sub, mut rx) = stream.channel();

        stream.push(7);
        stream.push(8);
        sub.unsubscribe();
        stream.push(9);

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, Some(8));
        assert_eq!(rx.recv().await, None);
    }
}
