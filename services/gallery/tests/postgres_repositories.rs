//! Repository tests against a live PostgreSQL (`DATABASE_URL`)

use common::database::{DatabaseConfig, init_pool};
use gallery::models::{NewImage, NewUser, Role};
use gallery::repositories::{
    self, ImageRepository, LikeRepository, PgImageRepository, PgLikeRepository, PgUserRepository,
    UserRepository,
};
use sqlx::PgPool;
use uuid::Uuid;

async fn like_rows(pool: &PgPool, image_id: i64) -> Vec<i64> {
    sqlx::query_scalar("SELECT user_id FROM likes WHERE image_id = $1 ORDER BY user_id")
        .bind(image_id)
        .fetch_all(pool)
        .await
        .unwrap()
}

async fn guest(users: &PgUserRepository) -> i64 {
    users
        .get_or_create(&NewUser {
            name: "示範訪客".to_string(),
            email: format!("guest_{}@demo.local", Uuid::new_v4().simple()),
            password_hash: "unused".to_string(),
            role: Role::Guest,
        })
        .await
        .unwrap()
        .id
}

async fn sunset(images: &PgImageRepository) -> i64 {
    images
        .create(&NewImage {
            name: "Sunset".to_string(),
            vibe: "peaceful".to_string(),
            image_path: "/storage/images/sunset.jpg".to_string(),
            user_id: None,
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore = "requires running PostgreSQL"]
async fn test_toggle_keeps_liked_by_in_sync_with_rows() {
    let pool = init_pool(&DatabaseConfig::from_env().unwrap()).await.unwrap();
    repositories::migrate(&pool).await.unwrap();

    let users = PgUserRepository::new(pool.clone());
    let images = PgImageRepository::new(pool.clone());
    let likes = PgLikeRepository::new(pool.clone());

    let user = users
        .get_or_create(&NewUser {
            name: "示範訪客".to_string(),
            email: format!("guest_{}@demo.local", Uuid::new_v4().simple()),
            password_hash: "unused".to_string(),
            role: Role::Guest,
        })
        .await
        .unwrap();
    let image = images
        .create(&NewImage {
            name: "Sunset".to_string(),
            vibe: "peaceful".to_string(),
            image_path: "/storage/images/sunset.jpg".to_string(),
            user_id: Some(user.id),
        })
        .await
        .unwrap();
    assert!(image.id > 50);
    assert!(image.liked_by.is_empty());

    let liked = likes.toggle(user.id, image.id).await.unwrap().unwrap();
    assert!(liked.is_liked);
    assert_eq!(liked.liked_by, vec![user.id]);
    assert_eq!(like_rows(&pool, image.id).await, vec![user.id]);
    assert!(likes.exists(user.id, image.id).await.unwrap());

    let stored = images.find_by_id(image.id).await.unwrap().unwrap();
    assert_eq!(stored.liked_by, vec![user.id]);

    let unliked = likes.toggle(user.id, image.id).await.unwrap().unwrap();
    assert!(!unliked.is_liked);
    assert!(unliked.liked_by.is_empty());
    assert_eq!(likes.count(image.id).await.unwrap(), 0);

    assert!(likes.toggle(user.id, -1).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running PostgreSQL"]
async fn test_concurrent_toggles_serialize_on_image_row() {
    let pool = init_pool(&DatabaseConfig::from_env().unwrap()).await.unwrap();
    repositories::migrate(&pool).await.unwrap();

    let users = PgUserRepository::new(pool.clone());
    let images = PgImageRepository::new(pool.clone());
    let likes = PgLikeRepository::new(pool.clone());
    let image_id = sunset(&images).await;

    let mut user_ids = Vec::new();
    for _ in 0..8 {
        user_ids.push(guest(&users).await);
    }
    user_ids.sort();

    // Each user toggles three times at once: every user ends up liking it
    let tasks: Vec<_> = user_ids
        .iter()
        .flat_map(|user_id| std::iter::repeat_n(*user_id, 3))
        .map(|user_id| {
            let likes = likes.clone();
            tokio::spawn(async move { likes.toggle(user_id, image_id).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap().unwrap();
    }

    assert_eq!(like_rows(&pool, image_id).await, user_ids);
    let stored = images.find_by_id(image_id).await.unwrap().unwrap();
    assert_eq!(stored.liked_by, user_ids);
    assert_eq!(likes.count(image_id).await.unwrap(), user_ids.len() as u64);
}
