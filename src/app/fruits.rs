//! 串流運算子示範，資料是固定的水果清單。
//!
//! 每個函式回傳一條惰性串流（或單值 future），示範一種組合方式：
//! map / filter / flat_map、concat / merge / zip、空串流的預設值，以及錯誤處理。

use crate::utils::error::{BookError, Result};
use futures::future::{self, FutureExt};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub const FRUITS: [&str; 3] = ["Mango", "Orange", "Banana"];
pub const FALLBACK_FRUITS: [&str; 2] = ["Pineapple", "Jack Fruit"];

fn owned(items: &[&str]) -> BoxStream<'static, String> {
    stream::iter(items.iter().map(|s| s.to_string()).collect::<Vec<_>>()).boxed()
}

fn fruit_source() -> BoxStream<'static, String> {
    owned(&FRUITS)
}

pub fn letters(word: &str) -> Vec<String> {
    word.chars().map(String::from).collect()
}

/// 每個元素之前先等 `delay`
pub fn delayed<T: Send + 'static>(items: Vec<T>, delay: Duration) -> BoxStream<'static, T> {
    stream::iter(items)
        .then(move |item| async move {
            tokio::time::sleep(delay).await;
            item
        })
        .boxed()
}

pub fn fruits() -> BoxStream<'static, String> {
    fruit_source()
        .inspect(|fruit| tracing::debug!("onNext({})", fruit))
        .boxed()
}

pub fn fruits_map() -> BoxStream<'static, String> {
    fruit_source().map(|s| s.to_uppercase()).boxed()
}

pub fn fruits_filter(min_len: usize) -> BoxStream<'static, String> {
    fruit_source()
        .filter(move |s| future::ready(s.len() > min_len))
        .boxed()
}

pub fn fruits_filter_map(min_len: usize) -> BoxStream<'static, String> {
    fruits_filter(min_len).map(|s| s.to_uppercase()).boxed()
}

pub fn fruits_flat_map() -> BoxStream<'static, String> {
    fruit_source()
        .flat_map(|s| stream::iter(letters(&s)))
        .boxed()
}

/// 每種水果的字母以不同間隔送出，結果彼此交錯
pub fn fruits_flat_map_async(base_delay: Duration) -> BoxStream<'static, String> {
    let inner: Vec<BoxStream<'static, String>> = FRUITS
        .iter()
        .enumerate()
        .map(|(index, fruit)| delayed(letters(fruit), base_delay * (index as u32 + 1)))
        .collect();
    stream::select_all(inner).boxed()
}

/// 即使有延遲也照水果的順序送出
pub fn fruits_concat_map(delay: Duration) -> BoxStream<'static, String> {
    fruit_source()
        .flat_map(move |s| delayed(letters(&s), delay))
        .boxed()
}

pub async fn fruit_single_flat_map() -> Vec<String> {
    future::ready("Mango".to_string())
        .map(|s| letters(&s))
        .await
}

pub fn fruit_single_flat_map_many() -> BoxStream<'static, String> {
    stream::once(future::ready("Mango".to_string()))
        .flat_map(|s| stream::iter(letters(&s)))
        .boxed()
}

pub type Stage = Arc<dyn Fn(BoxStream<'static, String>) -> BoxStream<'static, String> + Send + Sync>;

/// 可重複使用的過濾階段
pub fn longer_than(min_len: usize) -> Stage {
    Arc::new(move |source| {
        source
            .filter(move |s| future::ready(s.len() > min_len))
            .boxed()
    })
}

pub fn fruits_transform(min_len: usize) -> BoxStream<'static, String> {
    longer_than(min_len)(fruit_source())
}

/// 來源為空時改用 `fallback`
pub fn switch_if_empty<T>(
    source: BoxStream<'static, T>,
    fallback: BoxStream<'static, T>,
) -> BoxStream<'static, T>
where
    T: Send + Unpin + 'static,
{
    stream::once(async move {
        let mut source = source.peekable();
        if Pin::new(&mut source).peek().await.is_some() {
            source.boxed()
        } else {
            tracing::debug!("Source was empty, switching to fallback");
            fallback
        }
    })
    .flatten()
    .boxed()
}

pub fn fruits_default_if_empty(min_len: usize) -> BoxStream<'static, String> {
    switch_if_empty(fruits_transform(min_len), owned(&["Default"]))
}

pub fn fruits_switch_if_empty(min_len: usize) -> BoxStream<'static, String> {
    let filter = longer_than(min_len);
    switch_if_empty(filter(fruit_source()), filter(owned(&FALLBACK_FRUITS)))
}

pub fn fruits_concat() -> BoxStream<'static, String> {
    owned(&["Mango", "Orange"])
        .chain(owned(&["Tomato", "Lemon"]))
        .boxed()
}

pub fn fruits_single_concat() -> BoxStream<'static, String> {
    stream::once(future::ready("Mango".to_string()))
        .chain(stream::once(future::ready("Tomato".to_string())))
        .boxed()
}

fn timed_fruits() -> (BoxStream<'static, String>, BoxStream<'static, String>) {
    (
        delayed(vec!["Mango".to_string(), "Orange".to_string()], Duration::from_millis(50)),
        delayed(vec!["Tomato".to_string(), "Lemon".to_string()], Duration::from_millis(75)),
    )
}

/// 依到達時間交錯
pub fn fruits_merge() -> BoxStream<'static, String> {
    let (fruits, veggies) = timed_fruits();
    stream::select(fruits, veggies).boxed()
}

/// 兩條串流同時訂閱，但依訂閱順序輸出
pub fn fruits_merge_sequential() -> BoxStream<'static, String> {
    let (fruits, veggies) = timed_fruits();
    stream::iter(vec![fruits, veggies])
        .map(|s| s.collect::<Vec<String>>())
        .buffered(2)
        .flat_map(stream::iter)
        .boxed()
}

pub fn fruits_zip() -> BoxStream<'static, String> {
    owned(&["Mango", "Orange"])
        .zip(owned(&["Tomato", "Lemon"]))
        .map(|(first, second)| first + &second)
        .boxed()
}

pub fn fruits_zip3() -> BoxStream<'static, String> {
    owned(&["Mango", "Orange"])
        .zip(owned(&["Tomato", "Lemon"]))
        .zip(owned(&["Potato", "Beans"]))
        .map(|((first, second), third)| format!("{}{}{}", first, second, third))
        .boxed()
}

pub async fn fruit_single_zip() -> String {
    let (fruit, veggie) = future::join(
        future::ready("Mango".to_string()),
        future::ready("Tomato".to_string()),
    )
    .await;
    fruit + &veggie
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Subscribe,
    Next(String),
    Complete,
}

/// 在訂閱、每個元素與完成時呼叫 `hook`
pub fn fruits_filter_do_on<F>(min_len: usize, hook: F) -> BoxStream<'static, String>
where
    F: Fn(Signal) + Send + Sync + 'static,
{
    let hook = Arc::new(hook);
    let on_subscribe = Arc::clone(&hook);
    let on_next = Arc::clone(&hook);
    let source = fruits_filter(min_len);

    stream::once(async move {
        (*on_subscribe)(Signal::Subscribe);
        source
    })
    .flatten()
    .inspect(move |s| (*on_next)(Signal::Next(s.clone())))
    .map(Some)
    .chain(stream::once(async move {
        (*hook)(Signal::Complete);
        None
    }))
    .filter_map(future::ready)
    .boxed()
}

fn shout(fruit: &str) -> Result<String> {
    if fruit.eq_ignore_ascii_case("Mango") {
        return Err(BookError::ProcessingError {
            message: "Exception Occurred".to_string(),
        });
    }
    Ok(fruit.to_uppercase())
}

/// 送出到第一個錯誤為止（含該錯誤）
pub fn until_first_error<T: Send + 'static>(
    source: BoxStream<'static, Result<T>>,
) -> BoxStream<'static, Result<T>> {
    source
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .boxed()
}

/// 錯誤時改送 `fallback` 並結束
pub fn on_error_return<T: Send + 'static>(
    source: BoxStream<'static, Result<T>>,
    fallback: T,
) -> BoxStream<'static, T> {
    source
        .scan((false, Some(fallback)), |(done, fallback), item| {
            let next = if *done {
                None
            } else {
                match item {
                    Ok(value) => Some(value),
                    Err(error) => {
                        tracing::warn!("⚠️ Replacing error with fallback: {}", error);
                        *done = true;
                        fallback.take()
                    }
                }
            };
            future::ready(next)
        })
        .boxed()
}

pub fn fruits_on_error_return() -> BoxStream<'static, String> {
    let source = owned(&["Apple", "Mango"])
        .map(Ok)
        .chain(stream::once(future::ready(Err(BookError::ProcessingError {
            message: "Exception Occurred".to_string(),
        }))))
        .boxed();
    on_error_return(source, "Orange".to_string())
}

/// 出錯的元素被略過，其餘繼續處理
pub fn fruits_on_error_continue() -> BoxStream<'static, String> {
    owned(&["Apple", "Mango", "Orange"])
        .filter_map(|fruit| {
            let next = match shout(&fruit) {
                Ok(value) => Some(value),
                Err(error) => {
                    tracing::warn!("⚠️ Skipping {}: {}", fruit, error);
                    None
                }
            };
            future::ready(next)
        })
        .boxed()
}

/// 第一個錯誤被轉成 `IllegalState`，之後不再送出元素
pub fn fruits_on_error_map() -> BoxStream<'static, Result<String>> {
    let source = owned(&["Apple", "Mango", "Orange"])
        .map(|fruit| shout(&fruit))
        .boxed();
    until_first_error(source)
        .map_err(|error| {
            tracing::debug!("Mapping error: {}", error);
            BookError::IllegalState {
                message: "From onError Map".to_string(),
            }
        })
        .boxed()
}

pub fn fruits_on_error() -> BoxStream<'static, Result<String>> {
    let source = owned(&["Apple", "Mango", "Orange"])
        .map(|fruit| shout(&fruit))
        .boxed();
    until_first_error(source)
        .inspect_err(|error| tracing::error!("❌ {}", error))
        .boxed()
}
